//! Cycle orchestrator.
//!
//! Drives one evaluation cycle end to end: settle orders still in flight,
//! fetch bars, refresh indicators, evaluate exits before entries per
//! strategy, reconcile against the gateway, then publish priors for the
//! next cycle's crossover checks.
//!
//! One strategy failing (bad data, gateway hiccup) must not take the
//! others down: each strategy runs inside its own fault boundary and an
//! error there skips that strategy for this cycle only. Cycles never
//! overlap; `run_cycle` takes `&mut self`.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, error, info, warn};

use crate::domain::engine::IndicatorEngine;
use crate::domain::error::EngineError;
use crate::domain::ledger::Ledger;
use crate::domain::position::PositionId;
use crate::domain::signal::{Decision, ExitReason, evaluate};
use crate::domain::snapshot::Snapshot;
use crate::domain::strategy::{RankOrder, StrategyId, StrategyRule};
use crate::ports::bar_source::BarSource;
use crate::ports::gateway::{
    ExecutionGateway, GatewayPosition, IntentKey, OrderHandle, OrderIntent, OrderSide, OrderStatus,
};
use crate::ports::journal::{JournalSink, TradeEvent};

/// An exit whose close order did not fill; retried every cycle until the
/// position is gone. Positions are never forgotten.
#[derive(Debug, Clone)]
struct PendingExit {
    strategy: StrategyId,
    position: PositionId,
    reason: ExitReason,
}

#[derive(Debug, Clone)]
enum InFlightPurpose {
    Exit {
        position: PositionId,
        reason: ExitReason,
    },
    /// Snapshot from submit time, kept for stop/target derivation once
    /// the fill price is known.
    Entry { snapshot: Snapshot },
}

#[derive(Debug, Clone)]
struct InFlightOrder {
    strategy: StrategyId,
    symbol: String,
    handle: OrderHandle,
    purpose: InFlightPurpose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub entries: usize,
    pub exits: usize,
    pub errors: usize,
}

#[derive(Default)]
struct StrategyOutcome {
    entries: usize,
    exits: usize,
}

enum Resolution {
    Entered,
    Exited,
    StillOpen,
}

pub struct CycleOrchestrator<B, G, J> {
    bars: B,
    gateway: G,
    journal: J,
    strategies: Vec<StrategyRule>,
    ledgers: HashMap<StrategyId, Ledger>,
    engine: IndicatorEngine,
    universe: Vec<String>,
    priors: HashMap<(StrategyId, String), Snapshot>,
    pending_exits: Vec<PendingExit>,
    in_flight: Vec<InFlightOrder>,
    last_seen: HashMap<String, NaiveDateTime>,
    risk_per_trade_pct: Option<f64>,
    cycle: u64,
}

impl<B, G, J> CycleOrchestrator<B, G, J>
where
    B: BarSource,
    G: ExecutionGateway,
    J: JournalSink,
{
    pub fn new(
        bars: B,
        gateway: G,
        journal: J,
        strategies: Vec<StrategyRule>,
        universe: Vec<String>,
        risk_per_trade_pct: Option<f64>,
    ) -> Result<Self, EngineError> {
        let mut specs = Vec::new();
        let mut ledgers = HashMap::new();
        for strategy in &strategies {
            strategy.validate()?;
            specs.extend(strategy.indicator_ids());
            ledgers.insert(
                strategy.id.clone(),
                Ledger::new(
                    strategy.id.clone(),
                    strategy.initial_capital,
                    strategy.max_positions,
                ),
            );
        }
        Ok(CycleOrchestrator {
            bars,
            gateway,
            journal,
            strategies,
            ledgers,
            engine: IndicatorEngine::new(specs),
            universe,
            priors: HashMap::new(),
            pending_exits: Vec::new(),
            in_flight: Vec::new(),
            last_seen: HashMap::new(),
            risk_per_trade_pct,
            cycle: 0,
        })
    }

    pub fn ledger(&self, strategy: &StrategyId) -> Option<&Ledger> {
        self.ledgers.get(strategy)
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    pub fn run_cycle(&mut self, now: NaiveDateTime) -> CycleReport {
        let cycle = self.cycle;
        let mut entries = 0;
        let mut exits = 0;
        let mut errors = 0;

        // orders from earlier cycles first, so their fills are on the
        // books before any new decision is made
        let carried = std::mem::take(&mut self.in_flight);
        for order in carried {
            match self.resolve_in_flight(order, now) {
                Ok(Resolution::Entered) => entries += 1,
                Ok(Resolution::Exited) => exits += 1,
                Ok(Resolution::StillOpen) => {}
                Err(err) => {
                    error!(error = %err, "failed to resolve in-flight order");
                    errors += 1;
                }
            }
        }

        let mut new_bars = HashMap::new();
        for symbol in &self.universe {
            let since = self.last_seen.get(symbol).copied();
            match self.bars.fetch_bars(symbol, since) {
                Ok(bars) => {
                    if let Some(last) = bars.last() {
                        self.last_seen.insert(symbol.clone(), last.timestamp);
                    }
                    new_bars.insert(symbol.clone(), bars);
                }
                Err(err) => {
                    error!(symbol = %symbol, error = %err, "bar fetch failed, symbol skipped");
                    errors += 1;
                }
            }
        }

        let refresh = self.engine.refresh(new_bars);
        for err in &refresh.errors {
            error!(error = %err, "malformed series, symbol skipped this cycle");
        }
        errors += refresh.errors.len();
        let snapshots = refresh.snapshots;

        for strategy in &self.strategies {
            let Some(ledger) = self.ledgers.get_mut(&strategy.id) else {
                continue;
            };
            let outcome = process_strategy(
                strategy,
                ledger,
                &mut self.gateway,
                &mut self.journal,
                &snapshots,
                &self.priors,
                &mut self.pending_exits,
                &mut self.in_flight,
                self.risk_per_trade_pct,
                cycle,
                now,
            );
            match outcome {
                Ok(outcome) => {
                    entries += outcome.entries;
                    exits += outcome.exits;
                }
                Err(err) => {
                    error!(strategy = %strategy.id, error = %err, "strategy skipped this cycle");
                    errors += 1;
                }
            }
        }

        match self.gateway.open_positions() {
            Ok(external) => self.reconcile_ledgers(external, now),
            Err(err) => {
                error!(error = %err, "reconciliation skipped, gateway unavailable");
                errors += 1;
            }
        }

        for strategy in &self.strategies {
            for (symbol, snapshot) in &snapshots {
                self.priors
                    .insert((strategy.id.clone(), symbol.clone()), snapshot.clone());
            }
        }

        self.journal.record(TradeEvent::CycleSummary {
            cycle,
            entries,
            exits,
            errors,
        });
        info!(cycle, entries, exits, errors, "cycle complete");
        self.cycle += 1;

        CycleReport {
            cycle,
            entries,
            exits,
            errors,
        }
    }

    fn resolve_in_flight(
        &mut self,
        order: InFlightOrder,
        now: NaiveDateTime,
    ) -> Result<Resolution, EngineError> {
        let InFlightOrder {
            strategy: strategy_id,
            symbol,
            handle,
            purpose,
        } = order;
        let status = self.gateway.status(&handle)?;
        match (status, purpose) {
            (OrderStatus::Filled { price, .. }, InFlightPurpose::Exit { position, reason }) => {
                let Some(ledger) = self.ledgers.get_mut(&strategy_id) else {
                    return Ok(Resolution::StillOpen);
                };
                match ledger.close(position, price, now, reason) {
                    Ok(trade) => {
                        self.journal.record(TradeEvent::Closed(trade));
                        Ok(Resolution::Exited)
                    }
                    Err(err) => {
                        // already dropped by reconciliation
                        warn!(symbol = %symbol, error = %err, "late exit fill had no position");
                        Ok(Resolution::StillOpen)
                    }
                }
            }
            (
                OrderStatus::Filled {
                    price,
                    quantity,
                    timestamp,
                },
                InFlightPurpose::Entry { snapshot },
            ) => {
                let Some(strategy) = self.strategies.iter().find(|s| s.id == strategy_id) else {
                    return Ok(Resolution::StillOpen);
                };
                let Some(ledger) = self.ledgers.get_mut(&strategy_id) else {
                    return Ok(Resolution::StillOpen);
                };
                let stop = strategy.stop_price(price, quantity, &snapshot);
                let target = strategy.take_profit_price(price, quantity);
                let deadline = entry_deadline(strategy, timestamp);
                match ledger.open(
                    &symbol,
                    quantity,
                    price,
                    timestamp,
                    stop,
                    target,
                    Some(deadline),
                ) {
                    Ok(position) => {
                        self.journal.record(TradeEvent::Opened(position.clone()));
                        Ok(Resolution::Entered)
                    }
                    Err(err) => {
                        warn!(symbol = %symbol, error = %err, "late entry fill rejected by ledger");
                        self.journal.record(TradeEvent::EntryRejected {
                            strategy: strategy_id.clone(),
                            symbol: symbol.clone(),
                            reason: err.to_string(),
                        });
                        Ok(Resolution::StillOpen)
                    }
                }
            }
            (OrderStatus::Rejected(reason), InFlightPurpose::Exit { position, reason: why }) => {
                self.journal.record(TradeEvent::ExitRetry {
                    strategy: strategy_id.clone(),
                    symbol: symbol.clone(),
                    reason: reason.clone(),
                });
                self.pending_exits.push(PendingExit {
                    strategy: strategy_id,
                    position,
                    reason: why,
                });
                Ok(Resolution::StillOpen)
            }
            (OrderStatus::Rejected(reason), InFlightPurpose::Entry { .. }) => {
                self.journal.record(TradeEvent::EntryRejected {
                    strategy: strategy_id.clone(),
                    symbol: symbol.clone(),
                    reason,
                });
                Ok(Resolution::StillOpen)
            }
            (OrderStatus::Pending | OrderStatus::Unknown, purpose) => {
                debug!(symbol = %symbol, "order status not final, re-querying next cycle");
                self.in_flight.push(InFlightOrder {
                    strategy: strategy_id,
                    symbol,
                    handle,
                    purpose,
                });
                Ok(Resolution::StillOpen)
            }
        }
    }

    fn reconcile_ledgers(&mut self, external: Vec<GatewayPosition>, now: NaiveDateTime) {
        // each gateway position belongs to the ledger already holding its
        // symbol; unclaimed ones are adopted by the first strategy
        let mut assigned: HashMap<StrategyId, Vec<GatewayPosition>> = HashMap::new();
        for ext in external {
            let owner = self
                .ledgers
                .iter()
                .find(|(_, ledger)| ledger.has_position(&ext.symbol))
                .map(|(id, _)| id.clone())
                .or_else(|| self.strategies.first().map(|s| s.id.clone()));
            if let Some(owner) = owner {
                assigned.entry(owner).or_default().push(ext);
            }
        }

        for strategy in &self.strategies {
            let Some(ledger) = self.ledgers.get_mut(&strategy.id) else {
                continue;
            };
            let subset = assigned.remove(&strategy.id).unwrap_or_default();
            for discrepancy in ledger.reconcile(&subset, now) {
                warn!(strategy = %strategy.id, ?discrepancy, "books corrected against gateway");
                self.journal.record(TradeEvent::Discrepancy {
                    strategy: strategy.id.clone(),
                    detail: format!("{discrepancy:?}"),
                });
            }
        }
    }
}

/// Force-exit time for a fresh position: the session deadline, tightened
/// by `max_hold_minutes` when configured.
fn entry_deadline(strategy: &StrategyRule, entry_time: NaiveDateTime) -> NaiveDateTime {
    let session_end = entry_time.date().and_time(strategy.session_end);
    match strategy.max_hold_minutes {
        Some(minutes) => session_end.min(entry_time + Duration::minutes(minutes)),
        None => session_end,
    }
}

#[allow(clippy::too_many_arguments)]
fn process_strategy<G, J>(
    strategy: &StrategyRule,
    ledger: &mut Ledger,
    gateway: &mut G,
    journal: &mut J,
    snapshots: &HashMap<String, Snapshot>,
    priors: &HashMap<(StrategyId, String), Snapshot>,
    pending_exits: &mut Vec<PendingExit>,
    in_flight: &mut Vec<InFlightOrder>,
    risk_per_trade_pct: Option<f64>,
    cycle: u64,
    now: NaiveDateTime,
) -> Result<StrategyOutcome, EngineError>
where
    G: ExecutionGateway,
    J: JournalSink,
{
    let mut outcome = StrategyOutcome::default();
    let prior_for = |symbol: &str| priors.get(&(strategy.id.clone(), symbol.to_string()));

    // exits first: freed slots and cash are available to this cycle's entries
    let mut exit_actions: Vec<(PositionId, String, ExitReason)> = Vec::new();
    let mut i = 0;
    while i < pending_exits.len() {
        if pending_exits[i].strategy == strategy.id {
            let pending = pending_exits.remove(i);
            if let Some(position) = ledger.position(pending.position) {
                exit_actions.push((pending.position, position.symbol.clone(), pending.reason));
            }
        } else {
            i += 1;
        }
    }

    for position in ledger.open_positions() {
        if exit_actions.iter().any(|(id, _, _)| *id == position.id) {
            continue;
        }
        let decision = match snapshots.get(&position.symbol) {
            Some(snapshot) => evaluate(
                strategy,
                snapshot,
                prior_for(&position.symbol),
                Some(position),
                now,
            ),
            // no fresh data: only the deadline class still applies
            None if position.past_deadline(now) || now.time() >= strategy.session_end => {
                Decision::Exit(ExitReason::Deadline)
            }
            None => Decision::Hold,
        };
        if let Decision::Exit(reason) = decision {
            exit_actions.push((position.id, position.symbol.clone(), reason));
        }
    }

    for (position_id, symbol, reason) in exit_actions {
        let Some(position) = ledger.position(position_id) else {
            continue;
        };
        let side = if position.is_long() {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let intent = OrderIntent {
            key: IntentKey::exit(&strategy.id.0, &symbol, cycle),
            symbol: symbol.clone(),
            side,
            quantity: position.quantity.unsigned_abs() as i64,
        };
        let handle = match gateway.submit(intent) {
            Ok(handle) => handle,
            Err(err) => {
                pending_exits.push(PendingExit {
                    strategy: strategy.id.clone(),
                    position: position_id,
                    reason,
                });
                return Err(err);
            }
        };
        match gateway.status(&handle)? {
            OrderStatus::Filled { price, .. } => {
                let trade = ledger
                    .close(position_id, price, now, reason)
                    .map_err(EngineError::from)?;
                journal.record(TradeEvent::Closed(trade));
                outcome.exits += 1;
            }
            OrderStatus::Rejected(detail) => {
                warn!(strategy = %strategy.id, symbol = %symbol, detail = %detail, "close rejected, will retry");
                journal.record(TradeEvent::ExitRetry {
                    strategy: strategy.id.clone(),
                    symbol: symbol.clone(),
                    reason: detail,
                });
                pending_exits.push(PendingExit {
                    strategy: strategy.id.clone(),
                    position: position_id,
                    reason,
                });
            }
            OrderStatus::Pending | OrderStatus::Unknown => {
                in_flight.push(InFlightOrder {
                    strategy: strategy.id.clone(),
                    symbol: symbol.clone(),
                    handle,
                    purpose: InFlightPurpose::Exit {
                        position: position_id,
                        reason,
                    },
                });
            }
        }
    }

    // entries: rank all firing candidates, then fill slots best first
    let mut candidates: Vec<(f64, &String, &Snapshot)> = Vec::new();
    for (symbol, snapshot) in snapshots {
        if ledger.has_position(symbol) {
            continue;
        }
        if in_flight
            .iter()
            .any(|o| o.strategy == strategy.id && o.symbol == *symbol)
        {
            continue;
        }
        let decision = evaluate(strategy, snapshot, prior_for(symbol), None, now);
        if let Decision::Enter { score } = decision {
            candidates.push((score, symbol, snapshot));
        }
    }
    candidates.sort_by(|a, b| {
        let ordering = match strategy.rank_order {
            RankOrder::LowestFirst => a.0.total_cmp(&b.0),
            RankOrder::HighestFirst => b.0.total_cmp(&a.0),
        };
        ordering.then_with(|| a.1.cmp(b.1))
    });

    let mut slots = ledger.open_slots();
    for (_, symbol, snapshot) in candidates {
        if slots == 0 {
            break;
        }
        let price = snapshot.bar.close;
        // sizing reads cash as of this candidate, after earlier fills
        let stop_estimate = strategy.stop_price(price, 1, snapshot);
        let quantity = ledger.size_entry(
            strategy.position_size,
            price,
            stop_estimate,
            risk_per_trade_pct,
        );
        if quantity == 0 {
            debug!(strategy = %strategy.id, symbol = %symbol, "candidate skipped, sizes to zero");
            continue;
        }

        let intent = OrderIntent {
            key: IntentKey::entry(&strategy.id.0, symbol, cycle),
            symbol: symbol.clone(),
            side: OrderSide::Buy,
            quantity,
        };
        let handle = gateway.submit(intent)?;
        match gateway.status(&handle)? {
            OrderStatus::Filled {
                price: fill,
                quantity: filled_quantity,
                timestamp,
            } => {
                let stop = strategy.stop_price(fill, filled_quantity, snapshot);
                let target = strategy.take_profit_price(fill, filled_quantity);
                let deadline = entry_deadline(strategy, timestamp);
                match ledger.open(
                    symbol,
                    filled_quantity,
                    fill,
                    timestamp,
                    stop,
                    target,
                    Some(deadline),
                ) {
                    Ok(position) => {
                        journal.record(TradeEvent::Opened(position.clone()));
                        outcome.entries += 1;
                        slots -= 1;
                    }
                    Err(err) => {
                        warn!(strategy = %strategy.id, symbol = %symbol, error = %err, "entry fill rejected by ledger");
                        journal.record(TradeEvent::EntryRejected {
                            strategy: strategy.id.clone(),
                            symbol: symbol.clone(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
            OrderStatus::Rejected(detail) => {
                journal.record(TradeEvent::EntryRejected {
                    strategy: strategy.id.clone(),
                    symbol: symbol.clone(),
                    reason: detail,
                });
            }
            OrderStatus::Pending | OrderStatus::Unknown => {
                in_flight.push(InFlightOrder {
                    strategy: strategy.id.clone(),
                    symbol: symbol.clone(),
                    handle,
                    purpose: InFlightPurpose::Entry {
                        snapshot: snapshot.clone(),
                    },
                });
                slots -= 1;
            }
        }
    }

    Ok(outcome)
}
