//! # Q-Flow
//!
//! A deterministic token position and swap arbitration engine for
//! institutional queues.
//!
//! ## Design Principles
//!
//! - **Per-Queue Serialization**: Each queue is one serialization domain;
//!   every mutating operation holds it exclusively for its whole
//!   read-decide-write span
//! - **Explicit Time**: Every operation takes `now` as an argument, so
//!   behavior is a pure function of (state, command, time)
//! - **Frozen Numbers**: Completion and check-in never renumber; only
//!   cancellation, snoozing, and call expiry trigger reindexing
//! - **Constrained Swap Market**: Direct and range addressing with range
//!   laws, per-token credits, and a queue-wide pending cap
//!
//! ## Architecture
//!
//! ```text
//! [Command] --> [Engine: registry + per-queue Mutex]
//!                   |-- admission   (booking gates)
//!                   |-- lifecycle   (call / confirm / snooze / position)
//!                   |-- swap        (request / accept / decline)
//!                   `-- ledger      (tokens, numbers, reindexing)
//! ```

pub mod admission;
pub mod command;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod queue;
pub mod replay;
pub mod swap;
pub mod token;

// Re-exports for convenience
pub use command::{
    AcceptSwap, BookToken, CallNext, Command, ConfirmCheckIn, DeclineSwap, Outcome,
    PositionAction, PositionChange, QueueId, RequestSwap, SnoozeToken, SwapId, SwapTarget,
    TokenId, UserId,
};
pub use engine::Engine;
pub use error::QueueError;
pub use ledger::TokenLedger;
pub use queue::{QueueConfig, QueueState};
pub use replay::CommandRow;
pub use swap::{SwapBook, SwapRequest, SwapStatus};
pub use token::{Token, TokenStatus};
