//! Admission Controller: gates new bookings.

use chrono::{DateTime, Utc};

use crate::command::{QueueId, UserId};
use crate::error::QueueError;
use crate::queue::QueueState;
use crate::token::Token;

/// Book a token for `user_id` in this queue.
///
/// Rejection order: queue availability, duplicate active token, then
/// capacity. The capacity gate compares against the highest number ever
/// assigned (not the live WAITING count), so usable capacity degrades as
/// churn accumulates — preserved source behavior, pinned by tests.
pub fn book_token(
    state: &mut QueueState,
    user_id: UserId,
    queue_id: QueueId,
    now: DateTime<Utc>,
) -> Result<Token, QueueError> {
    if !state.config.is_open() {
        return Err(QueueError::QueueUnavailable);
    }

    if let Some(held) = state.ledger.active_token_for(user_id) {
        return Err(QueueError::DuplicateActiveToken {
            token_number: held.token_number,
        });
    }

    if state.ledger.next_number() > state.config.size {
        return Err(QueueError::QueueFull);
    }

    Ok(state.ledger.create_token(queue_id, user_id, now))
}
