//! Business-rule error taxonomy.
//!
//! Every variant is a locally detected, non-retryable outcome surfaced
//! verbatim to the caller. None represents a programming or storage
//! fault, and none is fatal to the process: each failure is scoped to
//! the single request that produced it.

use thiserror::Error;

/// Machine-checkable failure kinds for every engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue is closed, paused, or does not accept swaps.
    #[error("queue is unavailable (closed, paused, or swaps disabled)")]
    QueueUnavailable,

    /// The user already holds a WAITING token in this queue. The held
    /// token's number is carried for display.
    #[error("user already holds active token number {token_number}")]
    DuplicateActiveToken { token_number: u32 },

    /// The next token number would exceed the queue's configured size.
    #[error("queue is full")]
    QueueFull,

    /// The token is already called or is not WAITING.
    #[error("token is locked (already called or not waiting)")]
    TokenLocked,

    /// The per-queue bound on concurrent PENDING swap requests is reached.
    #[error("swap capacity for this queue is exhausted")]
    SwapCapacityExceeded,

    /// The sender token has spent its swap budget.
    #[error("no swap credits remaining")]
    NoSwapCredits,

    /// The sender token already has a PENDING request.
    #[error("a pending swap request already exists for this token")]
    DuplicatePendingRequest,

    /// Direct target is not strictly ahead or is more than 3 positions
    /// ahead of the sender.
    #[error("swap target is out of range")]
    TargetOutOfRange,

    /// Range is malformed: span of 10 or more, inverted bounds, or not
    /// strictly ahead of the sender.
    #[error("invalid position range")]
    InvalidRange,

    /// No WAITING token holds a number inside the requested range.
    #[error("no waiting token inside the requested range")]
    NoTargetInRange,

    /// The swap request passed its expiry deadline; it has been rejected.
    #[error("swap request has expired")]
    SwapExpired,

    /// A referenced token moved out of WAITING, or the positions no
    /// longer favor the exchange; the request has been rejected.
    #[error("swap request is no longer valid")]
    SwapNoLongerValid,

    /// Confirm was attempted on a token that was never called.
    #[error("token has not been called")]
    NotCalled,

    /// The 60-second call window lapsed before confirmation; the token
    /// was moved to the back of the line at `new_position`.
    #[error("call expired; token moved to position {new_position}")]
    Expired { new_position: u32 },

    /// Missing queue, token, or swap request.
    #[error("queue, token, or swap request not found")]
    NotFound,
}
