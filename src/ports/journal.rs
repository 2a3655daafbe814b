//! Trade journal port.

use crate::domain::position::{ClosedTrade, Position};
use crate::domain::strategy::StrategyId;

#[derive(Debug, Clone)]
pub enum TradeEvent {
    Opened(Position),
    Closed(ClosedTrade),
    EntryRejected {
        strategy: StrategyId,
        symbol: String,
        reason: String,
    },
    /// A close order was rejected; the exit is retried next cycle.
    ExitRetry {
        strategy: StrategyId,
        symbol: String,
        reason: String,
    },
    Discrepancy {
        strategy: StrategyId,
        detail: String,
    },
    CycleSummary {
        cycle: u64,
        entries: usize,
        exits: usize,
        errors: usize,
    },
}

pub trait JournalSink {
    fn record(&mut self, event: TradeEvent);
}
