//! Per-strategy position ledger.
//!
//! Owns the cash and open positions for one strategy and enforces the
//! entry gates: capacity, one position per symbol, and sufficient cash.
//! Every open debits `cash_available` by the notional and every close
//! credits the cost basis plus realized P&L, so cash is conserved exactly
//! across any sequence of trades.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::domain::error::LedgerError;
use crate::domain::position::{ClosedTrade, Position, PositionId};
use crate::domain::signal::ExitReason;
use crate::domain::strategy::StrategyId;
use crate::ports::gateway::GatewayPosition;

/// A difference between the ledger's books and the gateway's. The gateway
/// is the source of truth; the ledger is corrected, and the caller logs.
#[derive(Debug, Clone, PartialEq)]
pub enum Discrepancy {
    /// The gateway holds a position the ledger never opened. `funded`
    /// is the cash actually debited for it; less than the cost basis
    /// when the book could not cover the whole lot.
    Adopted {
        symbol: String,
        quantity: i64,
        entry_price: f64,
        funded: f64,
    },
    /// The ledger believed this position open but the gateway disagrees.
    Dropped {
        symbol: String,
        quantity: i64,
        entry_price: f64,
    },
    QuantityMismatch {
        symbol: String,
        ledger_quantity: i64,
        gateway_quantity: i64,
    },
}

#[derive(Debug, Clone)]
pub struct Ledger {
    pub strategy: StrategyId,
    pub initial_capital: f64,
    pub cash_available: f64,
    pub max_positions: usize,
    positions: HashMap<String, Position>,
    closed_trades: Vec<ClosedTrade>,
    next_id: u64,
}

impl Ledger {
    pub fn new(strategy: StrategyId, initial_capital: f64, max_positions: usize) -> Self {
        Ledger {
            strategy,
            initial_capital,
            cash_available: initial_capital,
            max_positions,
            positions: HashMap::new(),
            closed_trades: Vec::new(),
            next_id: 1,
        }
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn open_slots(&self) -> usize {
        self.max_positions.saturating_sub(self.positions.len())
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn position_for(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.values().find(|p| p.id == id)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    /// Shares affordable with the configured cash fraction, optionally
    /// capped by a risk budget over the per-share stop distance. Sized
    /// off `cash_available` as of this call; callers must re-read per
    /// candidate, not batch-size against a stale equity figure.
    pub fn size_entry(
        &self,
        fraction: f64,
        price: f64,
        stop: f64,
        risk_per_trade_pct: Option<f64>,
    ) -> i64 {
        if price <= 0.0 {
            return 0;
        }
        let mut quantity = (self.cash_available * fraction / price).floor() as i64;
        if let Some(risk_pct) = risk_per_trade_pct {
            let per_share_risk = (price - stop).abs();
            if per_share_risk > 0.0 {
                let risk_cap = (self.cash_available * (risk_pct / 100.0) / per_share_risk).floor() as i64;
                quantity = quantity.min(risk_cap);
            }
        }
        quantity.max(0)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &mut self,
        symbol: &str,
        quantity: i64,
        fill_price: f64,
        time: NaiveDateTime,
        stop_loss: f64,
        take_profit: Option<f64>,
        deadline: Option<NaiveDateTime>,
    ) -> Result<&Position, LedgerError> {
        if self.positions.len() >= self.max_positions {
            return Err(LedgerError::CapacityExceeded {
                limit: self.max_positions,
            });
        }
        if self.positions.contains_key(symbol) {
            return Err(LedgerError::DuplicateSymbol {
                symbol: symbol.to_string(),
            });
        }
        let notional = quantity.unsigned_abs() as f64 * fill_price;
        if notional > self.cash_available {
            return Err(LedgerError::InsufficientCapital {
                needed: notional,
                available: self.cash_available,
            });
        }

        self.cash_available -= notional;
        let position = Position {
            id: PositionId(self.next_id),
            strategy: self.strategy.clone(),
            symbol: symbol.to_string(),
            quantity,
            entry_price: fill_price,
            entry_time: time,
            stop_loss,
            take_profit,
            deadline,
        };
        self.next_id += 1;
        self.positions.insert(symbol.to_string(), position);
        Ok(&self.positions[symbol])
    }

    pub fn close(
        &mut self,
        id: PositionId,
        fill_price: f64,
        time: NaiveDateTime,
        reason: ExitReason,
    ) -> Result<ClosedTrade, LedgerError> {
        let symbol = self
            .positions
            .values()
            .find(|p| p.id == id)
            .map(|p| p.symbol.clone())
            .ok_or(LedgerError::UnknownPosition(id.0))?;
        let position = self
            .positions
            .remove(&symbol)
            .ok_or(LedgerError::UnknownPosition(id.0))?;

        let pnl = position.unrealized_pnl(fill_price);
        self.cash_available += position.cost_basis() + pnl;

        let trade = ClosedTrade {
            id: position.id,
            strategy: position.strategy,
            symbol: position.symbol,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price: fill_price,
            entry_time: position.entry_time,
            exit_time: time,
            pnl,
            reason,
        };
        self.closed_trades.push(trade.clone());
        Ok(trade)
    }

    pub fn unrealized_pnl(&self, id: PositionId, mark: f64) -> Result<f64, LedgerError> {
        self.position(id)
            .map(|p| p.unrealized_pnl(mark))
            .ok_or(LedgerError::UnknownPosition(id.0))
    }

    /// Cash plus open positions valued at the given marks; positions
    /// without a mark are carried at their entry price.
    pub fn mark_to_market(&self, prices: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|p| {
                let mark = prices.get(&p.symbol).copied().unwrap_or(p.entry_price);
                p.cost_basis() + p.unrealized_pnl(mark)
            })
            .sum();
        self.cash_available + position_value
    }

    /// Correct the books against what the gateway actually holds.
    pub fn reconcile(
        &mut self,
        external: &[GatewayPosition],
        now: NaiveDateTime,
    ) -> Vec<Discrepancy> {
        let mut discrepancies = Vec::new();

        for ext in external {
            match self.positions.get_mut(&ext.symbol) {
                None => {
                    let position = Position {
                        id: PositionId(self.next_id),
                        strategy: self.strategy.clone(),
                        symbol: ext.symbol.clone(),
                        quantity: ext.quantity,
                        entry_price: ext.entry_price,
                        entry_time: now,
                        stop_loss: 0.0,
                        take_profit: None,
                        deadline: None,
                    };
                    self.next_id += 1;
                    // never drive cash below zero over an adoption
                    let funded = position.cost_basis().min(self.cash_available).max(0.0);
                    self.cash_available -= funded;
                    self.positions.insert(ext.symbol.clone(), position);
                    discrepancies.push(Discrepancy::Adopted {
                        symbol: ext.symbol.clone(),
                        quantity: ext.quantity,
                        entry_price: ext.entry_price,
                        funded,
                    });
                }
                Some(position) if position.quantity != ext.quantity => {
                    discrepancies.push(Discrepancy::QuantityMismatch {
                        symbol: ext.symbol.clone(),
                        ledger_quantity: position.quantity,
                        gateway_quantity: ext.quantity,
                    });
                    let old_basis = position.cost_basis();
                    position.quantity = ext.quantity;
                    self.cash_available += old_basis - position.cost_basis();
                }
                Some(_) => {}
            }
        }

        let stale: Vec<String> = self
            .positions
            .keys()
            .filter(|symbol| !external.iter().any(|e| e.symbol == **symbol))
            .cloned()
            .collect();
        for symbol in stale {
            if let Some(position) = self.positions.remove(&symbol) {
                self.cash_available += position.cost_basis();
                discrepancies.push(Discrepancy::Dropped {
                    symbol: position.symbol,
                    quantity: position.quantity,
                    entry_price: position.entry_price,
                });
            }
        }

        discrepancies
    }
}
