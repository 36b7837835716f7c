//! Engine — queue registry, per-queue serialization, and the thin
//! request/response dispatch surface.
//!
//! Each queue is an independent serialization domain: one `Mutex` guards
//! its whole `QueueState`, and every mutating operation holds that lock
//! for its full read-decide-write span. Operations on different queues
//! never contend. The reward-point ledger lives behind its own lock and
//! is only touched after the queue lock is released, so no operation
//! ever holds two locks at once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};

use crate::admission;
use crate::command::{Command, Outcome, QueueId, SwapId, TokenId, UserId};
use crate::error::QueueError;
use crate::lifecycle::{self, PositionOutcome, CHECK_IN_REWARD_POINTS};
use crate::queue::{QueueConfig, QueueState};
use crate::swap::{self, SwapRequest, RECEIVER_REWARD_POINTS};
use crate::token::Token;

/// Recover a guard from a poisoned lock. A poisoned queue lock only
/// means a previous operation panicked; operations fail with business
/// errors, not panics, so the state behind the lock is still serialized.
fn recover<'a, T>(result: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>) -> MutexGuard<'a, T> {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The queue engine: registry of queues plus the reward-point ledger.
///
/// `Engine` is `Sync`; callers share it freely across threads.
pub struct Engine {
    /// Registry: queue id -> its serialization domain.
    queues: RwLock<FxHashMap<QueueId, Arc<Mutex<QueueState>>>>,
    /// Reward-point balances, read/incremented on behalf of the external
    /// user store.
    rewards: Mutex<FxHashMap<UserId, u64>>,
    /// Next queue id to issue.
    next_queue_id: Mutex<QueueId>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(FxHashMap::default()),
            rewards: Mutex::new(FxHashMap::default()),
            next_queue_id: Mutex::new(0),
        }
    }

    // ========================================================================
    // Registry (institution-side surface)
    // ========================================================================

    /// Register a queue and return its id.
    pub fn create_queue(&self, config: QueueConfig) -> QueueId {
        let queue_id = {
            let mut next = recover(self.next_queue_id.lock());
            *next += 1;
            *next
        };
        let mut registry = self
            .queues
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registry.insert(queue_id, Arc::new(Mutex::new(QueueState::new(config))));
        tracing::info!(queue = queue_id, size = config.size, "queue registered");
        queue_id
    }

    /// Pause or resume bookings.
    pub fn set_paused(&self, queue_id: QueueId, paused: bool) -> Result<(), QueueError> {
        self.with_queue(queue_id, |state| {
            state.config.is_paused = paused;
            Ok(())
        })
    }

    /// Close or reopen the queue.
    pub fn set_closed(&self, queue_id: QueueId, closed: bool) -> Result<(), QueueError> {
        self.with_queue(queue_id, |state| {
            state.config.is_closed = closed;
            Ok(())
        })
    }

    /// Open or shut the swap market.
    pub fn set_allow_swaps(&self, queue_id: QueueId, allow: bool) -> Result<(), QueueError> {
        self.with_queue(queue_id, |state| {
            state.config.allow_swaps = allow;
            Ok(())
        })
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Process one command at the given instant.
    ///
    /// This is the entire mutating surface: every variant locks exactly
    /// one queue for its whole evaluation. Time is explicit so behavior
    /// is reproducible; use [`Engine::process_now`] to run against the
    /// wall clock.
    pub fn process(&self, cmd: Command, now: DateTime<Utc>) -> Result<Outcome, QueueError> {
        match cmd {
            Command::Book(book) => {
                let token = self.with_queue(book.queue_id, |state| {
                    admission::book_token(state, book.user_id, book.queue_id, now)
                })?;
                tracing::debug!(
                    queue = book.queue_id,
                    user = book.user_id,
                    number = token.token_number,
                    "token booked"
                );
                Ok(Outcome::Booked {
                    token_id: token.id,
                    token_number: token.token_number,
                })
            }

            Command::Position(change) => {
                let outcome = self.with_queue(change.queue_id, |state| {
                    lifecycle::change_position(state, change.token_id, change.action, now)
                })?;
                Ok(match outcome {
                    PositionOutcome::Cancelled {
                        token_number,
                        claim_window_opened,
                    } => Outcome::Cancelled {
                        token_number,
                        claim_window_opened,
                    },
                    PositionOutcome::SwapRequested(swap) => Outcome::SwapRequested {
                        swap_id: swap.swap_id,
                        receiver_token: swap.receiver_token,
                        receiver_number: swap.receiver_number,
                    },
                    PositionOutcome::MovedBack { token_number } => {
                        Outcome::MovedBack { token_number }
                    }
                })
            }

            Command::RequestSwap(request) => {
                let swap = self.with_queue(request.queue_id, |state| {
                    swap::request_swap(state, request.sender_token, request.target, now)
                })?;
                Ok(Outcome::SwapRequested {
                    swap_id: swap.swap_id,
                    receiver_token: swap.receiver_token,
                    receiver_number: swap.receiver_number,
                })
            }

            Command::AcceptSwap(accept) => {
                let settled = self.with_queue(accept.queue_id, |state| {
                    swap::accept_swap(state, accept.swap_id, now)
                })?;
                self.credit(settled.receiver_user, RECEIVER_REWARD_POINTS);
                tracing::debug!(
                    queue = accept.queue_id,
                    swap = accept.swap_id,
                    "swap settled"
                );
                Ok(Outcome::SwapAccepted {
                    swap_id: settled.swap_id,
                    sender_number: settled.sender_number,
                    receiver_number: settled.receiver_number,
                })
            }

            Command::DeclineSwap(decline) => {
                let swap_id = self.with_queue(decline.queue_id, |state| {
                    swap::decline_swap(state, decline.swap_id, now)
                })?;
                Ok(Outcome::SwapDeclined { swap_id })
            }

            Command::CallNext(call) => {
                let called =
                    self.with_queue(call.queue_id, |state| Ok(lifecycle::call_next(state, now)))?;
                Ok(match called {
                    Some(called) => Outcome::Called {
                        token_id: called.token_id,
                        token_number: called.token_number,
                        user_id: called.user_id,
                    },
                    None => Outcome::QueueEmpty,
                })
            }

            Command::Confirm(confirm) => {
                let checked = self.with_queue(confirm.queue_id, |state| {
                    lifecycle::confirm(state, confirm.token_id, now)
                })?;
                self.credit(checked.user_id, CHECK_IN_REWARD_POINTS);
                Ok(Outcome::CheckedIn {
                    token_number: checked.token_number,
                })
            }

            Command::Snooze(snooze) => {
                let token_number = self.with_queue(snooze.queue_id, |state| {
                    lifecycle::snooze(state, snooze.token_id)
                })?;
                Ok(Outcome::Snoozed { token_number })
            }
        }
    }

    /// Process one command against the wall clock.
    pub fn process_now(&self, cmd: Command) -> Result<Outcome, QueueError> {
        self.process(cmd, Utc::now())
    }

    // ========================================================================
    // Read-only projections
    // ========================================================================

    /// Count of WAITING tokens in a queue.
    pub fn waiting_count(&self, queue_id: QueueId) -> Result<u32, QueueError> {
        self.with_queue(queue_id, |state| Ok(state.ledger.waiting_count()))
    }

    /// WAITING tokens ordered by position.
    pub fn positions(&self, queue_id: QueueId) -> Result<Vec<Token>, QueueError> {
        self.with_queue(queue_id, |state| Ok(state.ledger.positions()))
    }

    /// Any token by id, terminal ones included.
    pub fn token(&self, queue_id: QueueId, token_id: TokenId) -> Result<Token, QueueError> {
        self.with_queue(queue_id, |state| {
            state.ledger.token(token_id).copied().ok_or(QueueError::NotFound)
        })
    }

    /// Any swap request by id, settled ones included.
    pub fn swap_request(
        &self,
        queue_id: QueueId,
        swap_id: SwapId,
    ) -> Result<SwapRequest, QueueError> {
        self.with_queue(queue_id, |state| {
            state.swaps.request(swap_id).copied().ok_or(QueueError::NotFound)
        })
    }

    /// Current configuration of a queue.
    pub fn queue_config(&self, queue_id: QueueId) -> Result<QueueConfig, QueueError> {
        self.with_queue(queue_id, |state| Ok(state.config))
    }

    /// Reward-point balance for a user.
    pub fn reward_points(&self, user_id: UserId) -> u64 {
        recover(self.rewards.lock())
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }

    /// Order-independent hash over every queue's ledger and swap book,
    /// plus reward balances. Golden-master determinism surface.
    pub fn state_hash(&self) -> u64 {
        let registry = self.queues.read().unwrap_or_else(PoisonError::into_inner);
        let mut queue_ids: Vec<QueueId> = registry.keys().copied().collect();
        queue_ids.sort_unstable();

        let mut hasher = FxHasher::default();
        for queue_id in queue_ids {
            let state = recover(registry[&queue_id].lock());
            queue_id.hash(&mut hasher);
            state.ledger.state_hash().hash(&mut hasher);
            state.swaps.state_hash().hash(&mut hasher);
        }
        drop(registry);

        let rewards = recover(self.rewards.lock());
        let mut users: Vec<UserId> = rewards.keys().copied().collect();
        users.sort_unstable();
        for user in users {
            user.hash(&mut hasher);
            rewards[&user].hash(&mut hasher);
        }
        hasher.finish()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Run `f` with exclusive access to one queue's state. The registry
    /// read lock is released before the queue lock is taken, so registry
    /// writes (new queues) never wait on a long queue operation.
    fn with_queue<R>(
        &self,
        queue_id: QueueId,
        f: impl FnOnce(&mut QueueState) -> Result<R, QueueError>,
    ) -> Result<R, QueueError> {
        let slot = {
            let registry = self.queues.read().unwrap_or_else(PoisonError::into_inner);
            registry.get(&queue_id).cloned().ok_or(QueueError::NotFound)?
        };
        let mut state = recover(slot.lock());
        f(&mut state)
    }

    /// Credit reward points to a user's balance.
    fn credit(&self, user_id: UserId, points: u64) {
        let mut rewards = recover(self.rewards.lock());
        *rewards.entry(user_id).or_insert(0) += points;
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
