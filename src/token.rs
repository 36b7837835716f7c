//! Token records: a user's numbered place in a queue.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::command::{QueueId, TokenId, UserId};

/// How long a called token may take to confirm before it is auto-snoozed
/// to the back of the line.
pub const CALL_CONFIRM_WINDOW_SECS: i64 = 60;

/// Token lifecycle states.
///
/// `Waiting` is the only live state; `Completed` and `Skipped` are
/// terminal, and their token numbers are frozen forever at the value held
/// at the moment of transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStatus {
    Waiting,
    Completed,
    Skipped,
}

/// One numbered place in a queue, owned by exactly one user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub queue_id: QueueId,
    pub user_id: UserId,
    /// Positive position number. Contiguous `1..=W` across the WAITING
    /// set after every reindex-maintaining operation.
    pub token_number: u32,
    pub status: TokenStatus,
    pub joined_at: DateTime<Utc>,
    /// Set only while WAITING, when the token has been called but not yet
    /// confirmed. Cleared whenever the token returns to an unscheduled
    /// WAITING state (snooze, call expiry).
    pub called_at: Option<DateTime<Utc>>,
    /// Swap credits consumed by this token as a sender.
    pub swaps_used: u32,
}

impl Token {
    /// Create a fresh WAITING token at the given number.
    pub fn new(
        id: TokenId,
        queue_id: QueueId,
        user_id: UserId,
        token_number: u32,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            queue_id,
            user_id,
            token_number,
            status: TokenStatus::Waiting,
            joined_at,
            called_at: None,
            swaps_used: 0,
        }
    }

    /// Whether the token is in the live WAITING state.
    #[inline]
    pub fn is_waiting(&self) -> bool {
        self.status == TokenStatus::Waiting
    }

    /// Whether the call-confirm window has lapsed. Always false for a
    /// token that was never called.
    pub fn is_call_expired(&self, now: DateTime<Utc>) -> bool {
        match self.called_at {
            Some(called_at) => now > called_at + Duration::seconds(CALL_CONFIRM_WINDOW_SECS),
            None => false,
        }
    }
}
