//! Queue registry entries and the per-queue state bundle.

use serde::{Deserialize, Serialize};

use crate::ledger::TokenLedger;
use crate::swap::SwapBook;

/// Queue configuration, owned by one institution and mutated only by
/// institution operations outside this core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Capacity: the highest token number that may ever be assigned.
    pub size: u32,
    /// Advertised minutes per service slot. Informational only.
    pub service_time_minutes: u32,
    pub is_paused: bool,
    pub is_closed: bool,
    /// Whether the swap market is open for this queue.
    pub allow_swaps: bool,
    /// Swap budget each token may spend as a sender.
    pub max_swaps_per_user: u32,
}

impl QueueConfig {
    /// Config with the given capacity and default policy.
    pub fn with_size(size: u32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Whether new bookings are currently admissible.
    #[inline]
    pub fn is_open(&self) -> bool {
        !self.is_closed && !self.is_paused
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            size: 100,
            service_time_minutes: 5,
            is_paused: false,
            is_closed: false,
            allow_swaps: true,
            max_swaps_per_user: 2,
        }
    }
}

/// Everything one queue owns: its configuration, its token ledger, and
/// its swap book. One `QueueState` is one serialization domain — every
/// mutating operation holds exclusive access to it for the whole
/// read-decide-write span.
#[derive(Debug)]
pub struct QueueState {
    pub config: QueueConfig,
    pub ledger: TokenLedger,
    pub swaps: SwapBook,
}

impl QueueState {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            ledger: TokenLedger::new(),
            swaps: SwapBook::new(),
        }
    }
}
