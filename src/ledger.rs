//! Token Ledger and Position Manager for a single queue.
//!
//! Owns token-number assignment and every sanctioned way to renumber the
//! WAITING set. Three indexes are kept in lock-step with the primary
//! token store:
//!
//! - `waiting`: token number -> id, WAITING tokens only
//! - `active_by_user`: user -> their WAITING token, for the
//!   duplicate-active-token gate
//! - `max_assigned`: the highest token number ever assigned here, which
//!   only grows (booking and snooze advance it; reindex never shrinks it)

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHasher};

use crate::command::{QueueId, TokenId, UserId};
use crate::token::{Token, TokenStatus};

/// Per-queue token store with positional indexes.
#[derive(Debug, Default)]
pub struct TokenLedger {
    /// Primary store: every token ever issued, terminal ones included.
    tokens: FxHashMap<TokenId, Token>,
    /// WAITING index: token number -> id.
    waiting: FxHashMap<u32, TokenId>,
    /// One WAITING token per user at most.
    active_by_user: FxHashMap<UserId, TokenId>,
    /// Highest token number ever assigned. Monotonic for the lifetime of
    /// the queue; the capacity gate is computed against it.
    max_assigned: u32,
    /// Next token id to issue.
    next_token_id: TokenId,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Read access
    // ========================================================================

    /// Highest token number ever assigned in this queue.
    #[inline]
    pub fn max_assigned(&self) -> u32 {
        self.max_assigned
    }

    /// The number the next booking would receive.
    #[inline]
    pub fn next_number(&self) -> u32 {
        self.max_assigned + 1
    }

    /// Count of WAITING tokens.
    #[inline]
    pub fn waiting_count(&self) -> u32 {
        self.waiting.len() as u32
    }

    /// Look up any token by id, terminal ones included.
    #[inline]
    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    /// The WAITING token currently holding `number`, if any.
    pub fn token_at(&self, number: u32) -> Option<&Token> {
        self.waiting.get(&number).and_then(|id| self.tokens.get(id))
    }

    /// The user's WAITING token in this queue, if any.
    pub fn active_token_for(&self, user_id: UserId) -> Option<&Token> {
        self.active_by_user
            .get(&user_id)
            .and_then(|id| self.tokens.get(id))
    }

    /// The WAITING token with the smallest number (next to be called).
    pub fn front(&self) -> Option<&Token> {
        self.waiting
            .iter()
            .min_by_key(|(number, _)| **number)
            .and_then(|(_, id)| self.tokens.get(id))
    }

    /// The WAITING token closest to the front inside `[start, end]`.
    pub fn min_waiting_in_range(&self, start: u32, end: u32) -> Option<&Token> {
        self.waiting
            .iter()
            .filter(|(number, _)| (start..=end).contains(number))
            .min_by_key(|(number, _)| **number)
            .and_then(|(_, id)| self.tokens.get(id))
    }

    /// WAITING token numbers in ascending order.
    pub fn waiting_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.waiting.keys().copied().collect();
        numbers.sort_unstable();
        numbers
    }

    /// Snapshot of the WAITING set ordered by position (dashboard
    /// projection; read-only).
    pub fn positions(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self
            .waiting
            .values()
            .filter_map(|id| self.tokens.get(id))
            .copied()
            .collect();
        tokens.sort_unstable_by_key(|t| t.token_number);
        tokens
    }

    /// Whether WAITING numbers form exactly `1..=W`.
    pub fn is_contiguous(&self) -> bool {
        let w = self.waiting.len() as u32;
        (1..=w).all(|n| self.waiting.contains_key(&n))
    }

    // ========================================================================
    // Booking
    // ========================================================================

    /// Issue a fresh WAITING token at `max_assigned + 1`.
    ///
    /// Admission checks (capacity, duplicate, open state) are the
    /// caller's responsibility; this only assigns and indexes.
    pub fn create_token(
        &mut self,
        queue_id: QueueId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Token {
        let number = self.next_number();
        self.next_token_id += 1;
        let token = Token::new(self.next_token_id, queue_id, user_id, number, now);

        self.max_assigned = number;
        self.waiting.insert(number, token.id);
        self.active_by_user.insert(user_id, token.id);
        self.tokens.insert(token.id, token);
        token
    }

    // ========================================================================
    // Status transitions
    // ========================================================================

    /// Record the call timestamp on a WAITING token.
    pub fn set_called(&mut self, id: TokenId, now: DateTime<Utc>) {
        if let Some(token) = self.tokens.get_mut(&id) {
            debug_assert!(token.is_waiting());
            token.called_at = Some(now);
        }
    }

    /// Transition a WAITING token to COMPLETED. Its number is frozen and
    /// it leaves every positional index.
    pub fn complete(&mut self, id: TokenId) -> Token {
        self.retire(id, TokenStatus::Completed)
    }

    /// Transition a WAITING token to SKIPPED (cancellation). The caller
    /// reindexes afterwards.
    pub fn skip(&mut self, id: TokenId) -> Token {
        self.retire(id, TokenStatus::Skipped)
    }

    fn retire(&mut self, id: TokenId, status: TokenStatus) -> Token {
        let token = self.tokens.get_mut(&id).expect("retire: unknown token");
        debug_assert!(token.is_waiting());
        token.status = status;
        let snapshot = *token;
        self.waiting.remove(&snapshot.token_number);
        self.active_by_user.remove(&snapshot.user_id);
        snapshot
    }

    // ========================================================================
    // Renumbering — the only sanctioned ways to move WAITING tokens
    // ========================================================================

    /// Reassign `1..=W` over the WAITING set in current-number order,
    /// writing only tokens whose number actually changed.
    ///
    /// Must run with exclusive access to this queue's state for its whole
    /// duration; no other mutator may observe the intermediate numbering.
    ///
    /// Returns how many tokens were rewritten.
    pub fn reindex(&mut self) -> usize {
        let numbers = self.waiting_numbers();
        let mut rewritten = 0;

        for (slot, old_number) in numbers.into_iter().enumerate() {
            let new_number = slot as u32 + 1;
            if new_number == old_number {
                continue;
            }
            let id = self
                .waiting
                .remove(&old_number)
                .expect("reindex: stale waiting index");
            self.waiting.insert(new_number, id);
            if let Some(token) = self.tokens.get_mut(&id) {
                token.token_number = new_number;
            }
            rewritten += 1;
        }
        rewritten
    }

    /// Exchange the numbers of two WAITING tokens. A pure two-element
    /// permutation: every other number is untouched, so contiguity is
    /// preserved by construction and no reindex follows.
    pub fn exchange_numbers(&mut self, a: TokenId, b: TokenId) {
        let number_a = self.tokens[&a].token_number;
        let number_b = self.tokens[&b].token_number;

        self.waiting.insert(number_a, b);
        self.waiting.insert(number_b, a);
        if let Some(token) = self.tokens.get_mut(&a) {
            token.token_number = number_b;
        }
        if let Some(token) = self.tokens.get_mut(&b) {
            token.token_number = number_a;
        }
    }

    /// Send a WAITING token behind every number ever assigned: it takes
    /// `max_assigned + 1` and its call timestamp is cleared. The caller
    /// reindexes to restore contiguity.
    pub fn move_to_back(&mut self, id: TokenId) -> u32 {
        let new_number = self.next_number();
        self.max_assigned = new_number;

        let token = self.tokens.get_mut(&id).expect("move_to_back: unknown token");
        debug_assert!(token.is_waiting());
        let old_number = token.token_number;
        token.token_number = new_number;
        token.called_at = None;

        self.waiting.remove(&old_number);
        self.waiting.insert(new_number, id);
        new_number
    }

    /// Direct positional insert for move-back: every WAITING token with a
    /// number in `(current, target]` shifts one position toward the
    /// front, and the moving token takes `target`. Not a reindex; the
    /// permutation preserves contiguity on its own.
    pub fn shift_back(&mut self, id: TokenId, target: u32) {
        let current = self.tokens[&id].token_number;
        debug_assert!(target > current);

        self.waiting.remove(&current);
        for number in (current + 1)..=target {
            if let Some(shifted) = self.waiting.remove(&number) {
                self.waiting.insert(number - 1, shifted);
                if let Some(token) = self.tokens.get_mut(&shifted) {
                    token.token_number = number - 1;
                }
            }
        }
        self.waiting.insert(target, id);
        if let Some(token) = self.tokens.get_mut(&id) {
            token.token_number = target;
        }
    }

    /// Spend one swap credit on the sender token.
    pub fn increment_swaps_used(&mut self, id: TokenId) {
        if let Some(token) = self.tokens.get_mut(&id) {
            token.swaps_used += 1;
        }
    }

    // ========================================================================
    // Determinism support
    // ========================================================================

    /// Order-independent hash of the full ledger state, for golden-master
    /// determinism tests.
    pub fn state_hash(&self) -> u64 {
        let mut ids: Vec<TokenId> = self.tokens.keys().copied().collect();
        ids.sort_unstable();

        let mut hasher = FxHasher::default();
        self.max_assigned.hash(&mut hasher);
        for id in ids {
            let token = &self.tokens[&id];
            token.id.hash(&mut hasher);
            token.user_id.hash(&mut hasher);
            token.token_number.hash(&mut hasher);
            token.status.hash(&mut hasher);
            token.swaps_used.hash(&mut hasher);
            token.called_at.is_some().hash(&mut hasher);
        }
        hasher.finish()
    }
}
