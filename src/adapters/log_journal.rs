//! Journal sinks.
//!
//! `LogJournal` writes every trade event to the tracing pipeline and is
//! the default sink for the CLI. `MemoryJournal` keeps events in a Vec
//! for inspection in tests.

use crate::ports::journal::{JournalSink, TradeEvent};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct LogJournal;

impl JournalSink for LogJournal {
    fn record(&mut self, event: TradeEvent) {
        match event {
            TradeEvent::Opened(position) => info!(
                strategy = %position.strategy,
                symbol = %position.symbol,
                quantity = position.quantity,
                entry_price = position.entry_price,
                stop_loss = position.stop_loss,
                "position opened"
            ),
            TradeEvent::Closed(trade) => info!(
                strategy = %trade.strategy,
                symbol = %trade.symbol,
                quantity = trade.quantity,
                exit_price = trade.exit_price,
                pnl = trade.pnl,
                reason = %trade.reason,
                "position closed"
            ),
            TradeEvent::EntryRejected {
                strategy,
                symbol,
                reason,
            } => warn!(%strategy, %symbol, %reason, "entry rejected"),
            TradeEvent::ExitRetry {
                strategy,
                symbol,
                reason,
            } => warn!(%strategy, %symbol, %reason, "exit rejected, will retry"),
            TradeEvent::Discrepancy { strategy, detail } => {
                warn!(%strategy, %detail, "reconciliation discrepancy")
            }
            TradeEvent::CycleSummary {
                cycle,
                entries,
                exits,
                errors,
            } => info!(cycle, entries, exits, errors, "cycle complete"),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryJournal {
    events: Vec<TradeEvent>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TradeEvent] {
        &self.events
    }
}

impl JournalSink for MemoryJournal {
    fn record(&mut self, event: TradeEvent) {
        self.events.push(event);
    }
}
