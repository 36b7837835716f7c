//! Command and Outcome types for the queue engine.
//!
//! Commands are the thin request/response surface exposed to external
//! callers (booking, position changes, swaps, call/check-in). Outcomes
//! are the success payloads; failures are [`crate::error::QueueError`].

use serde::{Deserialize, Serialize};

/// Queue identifier, assigned by the engine registry.
pub type QueueId = u64;

/// User identifier, supplied by the external identity collaborator.
pub type UserId = u64;

/// Token identifier, unique within its queue.
pub type TokenId = u64;

/// Swap request identifier, unique within its queue.
pub type SwapId = u64;

// ============================================================================
// Input Commands
// ============================================================================

/// Book a new token for a user in a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookToken {
    pub queue_id: QueueId,
    pub user_id: UserId,
}

/// The action discriminator for the unified position-change command.
///
/// All variants require the token to be WAITING and not currently called.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionAction {
    /// Abandon the position: token becomes SKIPPED, queue is reindexed.
    Cancel,
    /// Propose a tiered-range swap toward the front of the line.
    MoveForward { range_start: u32, range_end: u32 },
    /// Step back to a later position (clamped to the end of the line).
    MoveBack { target_position: u32 },
}

/// Cancel, move-forward, or move-back a held token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChange {
    pub queue_id: QueueId,
    pub token_id: TokenId,
    pub action: PositionAction,
}

/// Addressing mode for a swap request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapTarget {
    /// Name an exact WAITING token number, at most 3 positions ahead.
    Direct { token_number: u32 },
    /// Name an inclusive range ahead of the sender; the receiver is the
    /// WAITING token closest to the front inside it. Span must be < 10.
    Range { start: u32, end: u32 },
}

/// Propose a position exchange with a token closer to the front.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSwap {
    pub queue_id: QueueId,
    pub sender_token: TokenId,
    pub target: SwapTarget,
}

/// Accept a pending swap request (receiver's consent).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptSwap {
    pub queue_id: QueueId,
    pub swap_id: SwapId,
}

/// Explicitly decline a pending swap request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclineSwap {
    pub queue_id: QueueId,
    pub swap_id: SwapId,
}

/// Call the front-most WAITING token to the counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNext {
    pub queue_id: QueueId,
}

/// Confirm check-in for a called token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmCheckIn {
    pub queue_id: QueueId,
    pub token_id: TokenId,
}

/// Voluntarily move a token to the back of the line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozeToken {
    pub queue_id: QueueId,
    pub token_id: TokenId,
}

/// Input commands from external callers.
///
/// One variant per exposed operation; every command names its queue, since
/// queues are independent serialization domains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Book a new token
    Book(BookToken),
    /// Cancel / move-forward / move-back, dispatched on the action tag
    Position(PositionChange),
    /// Create a swap request
    RequestSwap(RequestSwap),
    /// Settle a swap request in the sender's favor
    AcceptSwap(AcceptSwap),
    /// Decline a swap request
    DeclineSwap(DeclineSwap),
    /// Call the next token
    CallNext(CallNext),
    /// Confirm check-in of a called token
    Confirm(ConfirmCheckIn),
    /// Move a token to the back of the line
    Snooze(SnoozeToken),
}

impl Command {
    /// The queue this command operates on.
    #[inline]
    pub fn queue_id(&self) -> QueueId {
        match self {
            Command::Book(c) => c.queue_id,
            Command::Position(c) => c.queue_id,
            Command::RequestSwap(c) => c.queue_id,
            Command::AcceptSwap(c) => c.queue_id,
            Command::DeclineSwap(c) => c.queue_id,
            Command::CallNext(c) => c.queue_id,
            Command::Confirm(c) => c.queue_id,
            Command::Snooze(c) => c.queue_id,
        }
    }
}

// ============================================================================
// Success Outcomes
// ============================================================================

/// Success payloads returned by [`crate::engine::Engine::process`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Token booked and appended to the WAITING set.
    Booked {
        token_id: TokenId,
        token_number: u32,
    },
    /// Token cancelled (now SKIPPED). `claim_window_opened` reports that
    /// position 1 was vacated — a first-come-first-served claim signal,
    /// informational only.
    Cancelled {
        token_number: u32,
        claim_window_opened: bool,
    },
    /// Swap request created and now PENDING.
    SwapRequested {
        swap_id: SwapId,
        receiver_token: TokenId,
        receiver_number: u32,
    },
    /// Swap settled: the two numbers were exchanged.
    SwapAccepted {
        swap_id: SwapId,
        /// Sender's position after the exchange.
        sender_number: u32,
        /// Receiver's position after the exchange.
        receiver_number: u32,
    },
    /// Swap request explicitly declined.
    SwapDeclined { swap_id: SwapId },
    /// Front token called to the counter.
    Called {
        token_id: TokenId,
        token_number: u32,
        user_id: UserId,
    },
    /// No WAITING token to call.
    QueueEmpty,
    /// Check-in confirmed; token is COMPLETED at its frozen number.
    CheckedIn { token_number: u32 },
    /// Token moved to the back of the line; number is the post-reindex
    /// position.
    Snoozed { token_number: u32 },
    /// Token moved back to the (possibly clamped) target position.
    MovedBack { token_number: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_queue_id() {
        let cmd = Command::Book(BookToken {
            queue_id: 7,
            user_id: 42,
        });
        assert_eq!(cmd.queue_id(), 7);

        let cmd = Command::Position(PositionChange {
            queue_id: 3,
            token_id: 1,
            action: PositionAction::Cancel,
        });
        assert_eq!(cmd.queue_id(), 3);
    }

    #[test]
    fn test_position_action_dispatch() {
        let action = PositionAction::MoveBack { target_position: 9 };
        match action {
            PositionAction::MoveBack { target_position } => assert_eq!(target_position, 9),
            _ => panic!("Expected MoveBack"),
        }
    }
}
