//! CSV command replay: turn recorded operation logs back into commands.
//!
//! One row per operation. Columns are sparse; each `op` reads only the
//! columns it needs and a row that fails conversion is skipped, not
//! fatal, so partial or hand-edited logs still replay.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::command::{
    AcceptSwap, BookToken, CallNext, Command, ConfirmCheckIn, DeclineSwap, PositionAction,
    PositionChange, RequestSwap, SnoozeToken, SwapTarget,
};

/// Raw CSV row. Every column except `op` and `queue_id` is optional.
#[derive(Debug, Deserialize)]
pub struct CommandRow {
    pub op: String,
    pub queue_id: u64,
    pub user_id: Option<u64>,
    pub token_id: Option<u64>,
    pub swap_id: Option<u64>,
    pub number: Option<u32>,
    pub range_start: Option<u32>,
    pub range_end: Option<u32>,
    pub target_position: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CommandRow {
    /// Convert a raw row to a typed command. `None` when the row's `op`
    /// is unknown or a required column is missing.
    pub fn to_command(&self) -> Option<Command> {
        let queue_id = self.queue_id;
        match self.op.as_str() {
            "book" => Some(Command::Book(BookToken {
                queue_id,
                user_id: self.user_id?,
            })),
            "cancel" => Some(Command::Position(PositionChange {
                queue_id,
                token_id: self.token_id?,
                action: PositionAction::Cancel,
            })),
            "move_forward" => Some(Command::Position(PositionChange {
                queue_id,
                token_id: self.token_id?,
                action: PositionAction::MoveForward {
                    range_start: self.range_start?,
                    range_end: self.range_end?,
                },
            })),
            "move_back" => Some(Command::Position(PositionChange {
                queue_id,
                token_id: self.token_id?,
                action: PositionAction::MoveBack {
                    target_position: self.target_position?,
                },
            })),
            "request_swap" => {
                let target = match (self.number, self.range_start, self.range_end) {
                    (Some(token_number), _, _) => SwapTarget::Direct { token_number },
                    (None, Some(start), Some(end)) => SwapTarget::Range { start, end },
                    _ => return None,
                };
                Some(Command::RequestSwap(RequestSwap {
                    queue_id,
                    sender_token: self.token_id?,
                    target,
                }))
            }
            "accept_swap" => Some(Command::AcceptSwap(AcceptSwap {
                queue_id,
                swap_id: self.swap_id?,
            })),
            "decline_swap" => Some(Command::DeclineSwap(DeclineSwap {
                queue_id,
                swap_id: self.swap_id?,
            })),
            "call_next" => Some(Command::CallNext(CallNext { queue_id })),
            "confirm" => Some(Command::Confirm(ConfirmCheckIn {
                queue_id,
                token_id: self.token_id?,
            })),
            "snooze" => Some(Command::Snooze(SnoozeToken {
                queue_id,
                token_id: self.token_id?,
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(csv: &str) -> Vec<CommandRow> {
        csv::Reader::from_reader(csv.as_bytes())
            .deserialize()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    const HEADER: &str =
        "op,queue_id,user_id,token_id,swap_id,number,range_start,range_end,target_position,timestamp\n";

    #[test]
    fn test_book_row() {
        let rows = parse(&format!("{HEADER}book,1,42,,,,,,,"));
        assert_eq!(
            rows[0].to_command(),
            Some(Command::Book(BookToken { queue_id: 1, user_id: 42 }))
        );
    }

    #[test]
    fn test_swap_rows_pick_addressing_mode() {
        let rows = parse(&format!(
            "{HEADER}request_swap,1,,9,,3,,,,\nrequest_swap,1,,9,,,2,6,,"
        ));
        assert_eq!(
            rows[0].to_command(),
            Some(Command::RequestSwap(RequestSwap {
                queue_id: 1,
                sender_token: 9,
                target: SwapTarget::Direct { token_number: 3 },
            }))
        );
        assert_eq!(
            rows[1].to_command(),
            Some(Command::RequestSwap(RequestSwap {
                queue_id: 1,
                sender_token: 9,
                target: SwapTarget::Range { start: 2, end: 6 },
            }))
        );
    }

    #[test]
    fn test_unknown_op_and_missing_columns_are_skipped() {
        let rows = parse(&format!("{HEADER}frobnicate,1,,,,,,,,\nconfirm,1,,,,,,,,"));
        assert_eq!(rows[0].to_command(), None);
        // confirm without a token_id cannot be converted
        assert_eq!(rows[1].to_command(), None);
    }

    #[test]
    fn test_timestamp_column_parses() {
        let rows = parse(&format!(
            "{HEADER}call_next,2,,,,,,,,2026-01-01T09:00:00Z"
        ));
        assert!(rows[0].timestamp.is_some());
        assert_eq!(
            rows[0].to_command(),
            Some(Command::CallNext(CallNext { queue_id: 2 }))
        );
    }
}
