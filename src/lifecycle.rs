//! Call / Check-in state machine and the unified position-change command.
//!
//! Per-token flow: WAITING(uncalled) -> WAITING(called) -> COMPLETED, or
//! back to WAITING(uncalled) at the back of the line. The call-expiry
//! timeout is checked synchronously at confirm time — there is no timer
//! thread, so an expired call that nobody inspects never auto-resolves.

use chrono::{DateTime, Utc};

use crate::command::{PositionAction, SwapTarget, TokenId, UserId};
use crate::error::QueueError;
use crate::queue::QueueState;
use crate::swap::{self, RequestedSwap};

/// Reward points credited to a user on confirmed check-in.
pub const CHECK_IN_REWARD_POINTS: u64 = 10;

/// The token summoned by [`call_next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalledToken {
    pub token_id: TokenId,
    pub token_number: u32,
    pub user_id: UserId,
}

/// A confirmed check-in, with the user to credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmedCheckIn {
    pub token_number: u32,
    pub user_id: UserId,
}

/// Success payloads of the unified position-change dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionOutcome {
    Cancelled {
        token_number: u32,
        /// True when position 1 was vacated: the informational
        /// first-come-first-served claim signal.
        claim_window_opened: bool,
    },
    SwapRequested(RequestedSwap),
    MovedBack { token_number: u32 },
}

/// Summon the WAITING token with the smallest number.
///
/// Returns `None` when the queue is empty. Sets `called_at = now` without
/// touching number or status; re-calling an already-called token restarts
/// its confirm window.
pub fn call_next(state: &mut QueueState, now: DateTime<Utc>) -> Option<CalledToken> {
    let front = state.ledger.front().copied()?;
    state.ledger.set_called(front.id, now);
    Some(CalledToken {
        token_id: front.id,
        token_number: front.token_number,
        user_id: front.user_id,
    })
}

/// Confirm check-in for a called token.
///
/// A confirm arriving after the 60-second window auto-snoozes the token
/// to the back of the line and reports `Expired` with the new position —
/// the caller does not get a success.
pub fn confirm(
    state: &mut QueueState,
    token_id: TokenId,
    now: DateTime<Utc>,
) -> Result<ConfirmedCheckIn, QueueError> {
    let token = *state.ledger.token(token_id).ok_or(QueueError::NotFound)?;
    if !token.is_waiting() {
        return Err(QueueError::TokenLocked);
    }
    if token.called_at.is_none() {
        return Err(QueueError::NotCalled);
    }
    if token.is_call_expired(now) {
        let new_position = snooze_to_back(state, token_id);
        tracing::debug!(token = token_id, new_position, "call expired, token auto-snoozed");
        return Err(QueueError::Expired { new_position });
    }

    let completed = state.ledger.complete(token_id);
    Ok(ConfirmedCheckIn {
        token_number: completed.token_number,
        user_id: completed.user_id,
    })
}

/// Voluntarily move a WAITING token to the back of the line, regardless
/// of call state. Returns the post-reindex position.
pub fn snooze(state: &mut QueueState, token_id: TokenId) -> Result<u32, QueueError> {
    let token = state.ledger.token(token_id).ok_or(QueueError::NotFound)?;
    if !token.is_waiting() {
        return Err(QueueError::TokenLocked);
    }
    Ok(snooze_to_back(state, token_id))
}

/// The shared move-to-back: fresh number past the high-water mark, call
/// timestamp cleared, then a reindex to restore contiguity. Returns the
/// token's post-reindex position.
fn snooze_to_back(state: &mut QueueState, token_id: TokenId) -> u32 {
    state.ledger.move_to_back(token_id);
    state.ledger.reindex();
    state
        .ledger
        .token(token_id)
        .expect("snoozed token vanished")
        .token_number
}

/// Unified cancel / move-forward / move-back entry point, dispatched on
/// the action tag.
///
/// Every action requires the token to be WAITING and not currently
/// called; a called token is locked until confirmed or snoozed.
pub fn change_position(
    state: &mut QueueState,
    token_id: TokenId,
    action: PositionAction,
    now: DateTime<Utc>,
) -> Result<PositionOutcome, QueueError> {
    let token = *state.ledger.token(token_id).ok_or(QueueError::NotFound)?;
    if !token.is_waiting() || token.called_at.is_some() {
        return Err(QueueError::TokenLocked);
    }

    match action {
        PositionAction::Cancel => {
            let skipped = state.ledger.skip(token_id);
            state.ledger.reindex();
            Ok(PositionOutcome::Cancelled {
                token_number: skipped.token_number,
                claim_window_opened: skipped.token_number == 1,
            })
        }
        PositionAction::MoveForward {
            range_start,
            range_end,
        } => {
            let requested = swap::request_swap(
                state,
                token_id,
                SwapTarget::Range {
                    start: range_start,
                    end: range_end,
                },
                now,
            )?;
            Ok(PositionOutcome::SwapRequested(requested))
        }
        PositionAction::MoveBack { target_position } => {
            if target_position <= token.token_number {
                return Err(QueueError::InvalidRange);
            }
            let last = state
                .ledger
                .waiting_numbers()
                .last()
                .copied()
                .unwrap_or(token.token_number);
            let clamped = target_position.min(last);
            if clamped > token.token_number {
                state.ledger.shift_back(token_id, clamped);
            }
            Ok(PositionOutcome::MovedBack {
                token_number: clamped.max(token.token_number),
            })
        }
    }
}
