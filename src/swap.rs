//! Swap Arbitration Engine: the constrained market that lets a token
//! trade positions with one closer to the front.
//!
//! Requests are created PENDING and settle exactly once to ACCEPTED or
//! REJECTED. There is no background sweep: expiry is evaluated lazily on
//! every request/accept/decline call, so an expired request that nobody
//! inspects never auto-resolves.

use chrono::{DateTime, Duration, Utc};
use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::command::{QueueId, SwapId, SwapTarget, TokenId, UserId};
use crate::error::QueueError;
use crate::ledger::TokenLedger;
use crate::queue::QueueState;
use crate::token::Token;

/// How long a request stays actionable after creation. Policy constant,
/// not a protocol requirement.
pub const SWAP_PENDING_TTL_SECS: i64 = 300;

/// A direct target must sit at most this many positions ahead.
pub const DIRECT_TARGET_MAX_AHEAD: u32 = 3;

/// A tiered range must span strictly fewer positions than this.
pub const RANGE_MAX_SPAN: u32 = 10;

/// Fraction of the WAITING set that may hold PENDING requests at once.
pub const SWAP_CAPACITY_RATIO: f64 = 0.2;

/// Reward points credited to the receiver's user on acceptance.
pub const RECEIVER_REWARD_POINTS: u64 = 5;

/// PENDING requests allowed to coexist given the WAITING count:
/// `max(1, floor(0.2 * total_waiting))`.
#[inline]
pub fn pending_limit(total_waiting: u32) -> u32 {
    ((SWAP_CAPACITY_RATIO * total_waiting as f64).floor() as u32).max(1)
}

// ============================================================================
// Swap request records
// ============================================================================

/// Swap request lifecycle. `Accepted` and `Rejected` are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A proposal for two tokens to exchange numbers, scoped to one queue.
///
/// `sender` wants to move earlier; `receiver` currently holds the desired
/// position. Tokens are referenced, not owned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub id: SwapId,
    pub queue_id: QueueId,
    pub sender: TokenId,
    pub receiver: TokenId,
    pub status: SwapStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SwapRequest {
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == SwapStatus::Pending
    }

    /// Whether the deadline has passed. Strict: a request is actionable
    /// through its deadline instant.
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether this PENDING request names `token` on either side.
    #[inline]
    fn names(&self, token: TokenId) -> bool {
        self.sender == token || self.receiver == token
    }
}

// ============================================================================
// Swap book
// ============================================================================

/// Per-queue store of swap requests.
///
/// Terminal requests are retained for audit; the `pending_by_sender`
/// index enforces the one-PENDING-request-per-sender rule and doubles as
/// the PENDING count.
#[derive(Debug, Default)]
pub struct SwapBook {
    requests: FxHashMap<SwapId, SwapRequest>,
    pending_by_sender: FxHashMap<TokenId, SwapId>,
    next_swap_id: SwapId,
}

impl SwapBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up any request by id, settled ones included.
    #[inline]
    pub fn request(&self, id: SwapId) -> Option<&SwapRequest> {
        self.requests.get(&id)
    }

    /// Count of PENDING requests in this queue.
    #[inline]
    pub fn pending_count(&self) -> u32 {
        self.pending_by_sender.len() as u32
    }

    /// Whether `sender` already has a PENDING request.
    #[inline]
    pub fn has_pending_from(&self, sender: TokenId) -> bool {
        self.pending_by_sender.contains_key(&sender)
    }

    /// Create a PENDING request with its deadline derived from `now`.
    pub fn create(
        &mut self,
        queue_id: QueueId,
        sender: TokenId,
        receiver: TokenId,
        now: DateTime<Utc>,
    ) -> SwapRequest {
        self.next_swap_id += 1;
        let request = SwapRequest {
            id: self.next_swap_id,
            queue_id,
            sender,
            receiver,
            status: SwapStatus::Pending,
            created_at: now,
            expires_at: now + Duration::seconds(SWAP_PENDING_TTL_SECS),
        };
        self.requests.insert(request.id, request);
        self.pending_by_sender.insert(sender, request.id);
        request
    }

    /// Settle a PENDING request as REJECTED.
    pub fn mark_rejected(&mut self, id: SwapId) {
        if let Some(request) = self.requests.get_mut(&id) {
            debug_assert!(request.is_pending());
            request.status = SwapStatus::Rejected;
            self.pending_by_sender.remove(&request.sender);
        }
    }

    /// Settle a PENDING request as ACCEPTED.
    pub fn mark_accepted(&mut self, id: SwapId) {
        if let Some(request) = self.requests.get_mut(&id) {
            debug_assert!(request.is_pending());
            request.status = SwapStatus::Accepted;
            self.pending_by_sender.remove(&request.sender);
        }
    }

    /// Lazily resolve every PENDING request past its deadline to
    /// REJECTED. Returns how many were expired.
    pub fn expire_stale(&mut self, now: DateTime<Utc>) -> usize {
        let stale: Vec<SwapId> = self
            .requests
            .values()
            .filter(|r| r.is_pending() && r.is_expired(now))
            .map(|r| r.id)
            .collect();
        for id in &stale {
            self.mark_rejected(*id);
            tracing::debug!(swap = id, "swap request expired");
        }
        stale.len()
    }

    /// Reject every PENDING request naming either token as sender or
    /// receiver, excluding `except`. Stale proposals referencing
    /// now-moved tokens must not be actionable.
    pub fn cascade_reject(&mut self, a: TokenId, b: TokenId, except: SwapId) -> Vec<SwapId> {
        let conflicting: Vec<SwapId> = self
            .requests
            .values()
            .filter(|r| r.is_pending() && r.id != except && (r.names(a) || r.names(b)))
            .map(|r| r.id)
            .collect();
        for id in &conflicting {
            self.mark_rejected(*id);
        }
        conflicting
    }

    /// Order-independent hash of the swap book, folded into the engine
    /// state hash.
    pub fn state_hash(&self) -> u64 {
        let mut ids: Vec<SwapId> = self.requests.keys().copied().collect();
        ids.sort_unstable();

        let mut hasher = FxHasher::default();
        for id in ids {
            let request = &self.requests[&id];
            request.id.hash(&mut hasher);
            request.sender.hash(&mut hasher);
            request.receiver.hash(&mut hasher);
            request.status.hash(&mut hasher);
        }
        hasher.finish()
    }
}

// ============================================================================
// Arbitration
// ============================================================================

/// Successful request creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestedSwap {
    pub swap_id: SwapId,
    pub receiver_token: TokenId,
    pub receiver_number: u32,
}

/// Successful settlement: numbers after the exchange, plus the user to
/// credit with reward points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceptedSwap {
    pub swap_id: SwapId,
    pub sender_token: TokenId,
    pub receiver_token: TokenId,
    pub sender_number: u32,
    pub receiver_number: u32,
    pub receiver_user: UserId,
}

/// Create a swap request from `sender_token` toward `target`.
///
/// Stale PENDING requests are lazily expired first, then the admission
/// gates run in order: swap market open, sender WAITING, queue-wide
/// capacity, sender credits, one-pending-per-sender, and finally the
/// addressing-mode range laws.
pub fn request_swap(
    state: &mut QueueState,
    sender_token: TokenId,
    target: SwapTarget,
    now: DateTime<Utc>,
) -> Result<RequestedSwap, QueueError> {
    state.swaps.expire_stale(now);

    let sender = *state.ledger.token(sender_token).ok_or(QueueError::NotFound)?;
    if !state.config.allow_swaps {
        return Err(QueueError::QueueUnavailable);
    }
    if !sender.is_waiting() {
        return Err(QueueError::TokenLocked);
    }

    let limit = pending_limit(state.ledger.waiting_count());
    if state.swaps.pending_count() >= limit {
        return Err(QueueError::SwapCapacityExceeded);
    }
    if sender.swaps_used >= state.config.max_swaps_per_user {
        return Err(QueueError::NoSwapCredits);
    }
    if state.swaps.has_pending_from(sender_token) {
        return Err(QueueError::DuplicatePendingRequest);
    }

    let receiver = resolve_target(&state.ledger, &sender, target)?;
    let request = state
        .swaps
        .create(sender.queue_id, sender_token, receiver.id, now);

    tracing::debug!(
        queue = request.queue_id,
        swap = request.id,
        sender = sender_token,
        receiver = receiver.id,
        "swap request created"
    );

    Ok(RequestedSwap {
        swap_id: request.id,
        receiver_token: receiver.id,
        receiver_number: receiver.token_number,
    })
}

/// Resolve the receiver token for either addressing mode, enforcing the
/// range laws.
fn resolve_target(
    ledger: &TokenLedger,
    sender: &Token,
    target: SwapTarget,
) -> Result<Token, QueueError> {
    match target {
        SwapTarget::Direct { token_number } => {
            let ahead = token_number < sender.token_number
                && sender.token_number - token_number <= DIRECT_TARGET_MAX_AHEAD;
            if !ahead {
                return Err(QueueError::TargetOutOfRange);
            }
            ledger
                .token_at(token_number)
                .copied()
                .ok_or(QueueError::NotFound)
        }
        SwapTarget::Range { start, end } => {
            let well_formed = start <= end
                && end - start < RANGE_MAX_SPAN
                && end < sender.token_number;
            if !well_formed {
                return Err(QueueError::InvalidRange);
            }
            ledger
                .min_waiting_in_range(start, end)
                .copied()
                .ok_or(QueueError::NoTargetInRange)
        }
    }
}

/// Settle a PENDING request in the sender's favor.
///
/// Runs as one indivisible step under the queue lock: a failure partway
/// (expired, stale) leaves no partial number exchange. On success the two
/// numbers are exchanged (a pure permutation — nothing else moves), the
/// sender spends a swap credit, and every other PENDING request naming
/// either token is cascade-rejected.
pub fn accept_swap(
    state: &mut QueueState,
    swap_id: SwapId,
    now: DateTime<Utc>,
) -> Result<AcceptedSwap, QueueError> {
    // Resolve the target request before the lazy sweep so its own lapse
    // surfaces as SwapExpired, not NotFound.
    let request = match state.swaps.request(swap_id) {
        Some(r) if r.is_pending() => *r,
        _ => return Err(QueueError::NotFound),
    };
    if request.is_expired(now) {
        state.swaps.mark_rejected(swap_id);
        state.swaps.expire_stale(now);
        return Err(QueueError::SwapExpired);
    }
    state.swaps.expire_stale(now);

    let sender = state.ledger.token(request.sender).copied();
    let receiver = state.ledger.token(request.receiver).copied();
    let (sender, receiver) = match (sender, receiver) {
        (Some(s), Some(r)) if s.is_waiting() && r.is_waiting() => (s, r),
        _ => {
            state.swaps.mark_rejected(swap_id);
            return Err(QueueError::SwapNoLongerValid);
        }
    };
    // Stale-data check: the receiver must still sit ahead of the sender.
    if receiver.token_number >= sender.token_number {
        state.swaps.mark_rejected(swap_id);
        return Err(QueueError::SwapNoLongerValid);
    }

    state.ledger.exchange_numbers(request.sender, request.receiver);
    state.ledger.increment_swaps_used(request.sender);
    state.swaps.mark_accepted(swap_id);

    let rejected = state.swaps.cascade_reject(request.sender, request.receiver, swap_id);
    if !rejected.is_empty() {
        tracing::debug!(
            queue = request.queue_id,
            swap = swap_id,
            cascaded = rejected.len(),
            "conflicting swap requests rejected"
        );
    }

    Ok(AcceptedSwap {
        swap_id,
        sender_token: request.sender,
        receiver_token: request.receiver,
        sender_number: receiver.token_number,
        receiver_number: sender.token_number,
        receiver_user: receiver.user_id,
    })
}

/// Explicitly decline a PENDING request.
pub fn decline_swap(
    state: &mut QueueState,
    swap_id: SwapId,
    now: DateTime<Utc>,
) -> Result<SwapId, QueueError> {
    state.swaps.expire_stale(now);
    match state.swaps.request(swap_id) {
        Some(r) if r.is_pending() => {
            state.swaps.mark_rejected(swap_id);
            Ok(swap_id)
        }
        _ => Err(QueueError::NotFound),
    }
}
