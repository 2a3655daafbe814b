//! Open positions and closed trades.
//!
//! A position is direction-agnostic: the sign of `quantity` carries long
//! vs short, and every P&L and protection check works off that sign. The
//! entry price is the actual fill, never the signal price.

use chrono::NaiveDateTime;

use crate::domain::signal::ExitReason;
use crate::domain::strategy::StrategyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionId(pub u64);

#[derive(Debug, Clone)]
pub struct Position {
    pub id: PositionId,
    pub strategy: StrategyId,
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    /// Force-exit time; `None` means only the session-end deadline applies.
    pub deadline: Option<NaiveDateTime>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    /// Capital committed at entry, always positive.
    pub fn cost_basis(&self) -> f64 {
        self.quantity.unsigned_abs() as f64 * self.entry_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity.unsigned_abs() as f64 * price
    }

    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        self.quantity as f64 * (mark - self.entry_price)
    }

    pub fn should_stop(&self, price: f64) -> bool {
        if self.stop_loss == 0.0 {
            return false;
        }
        if self.is_long() {
            price <= self.stop_loss
        } else {
            price >= self.stop_loss
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        let Some(target) = self.take_profit else {
            return false;
        };
        if self.is_long() {
            price >= target
        } else {
            price <= target
        }
    }

    pub fn past_deadline(&self, now: NaiveDateTime) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

#[derive(Debug, Clone)]
pub struct ClosedTrade {
    pub id: PositionId,
    pub strategy: StrategyId,
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub pnl: f64,
    pub reason: ExitReason,
}
