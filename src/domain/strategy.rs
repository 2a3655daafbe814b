//! Strategy configuration.
//!
//! A `StrategyRule` is the complete, immutable description of one strategy:
//! entry/exit/filter rules, ranking expression, sizing and risk knobs, and
//! the intraday deadline. The orchestrator takes a slice of these and never
//! mutates them mid-session.

use std::fmt;

use chrono::NaiveTime;

use crate::domain::error::EngineError;
use crate::domain::indicator::{IndicatorField, IndicatorId};
use crate::domain::rule::{Operand, Rule};
use crate::domain::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrategyId(pub String);

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of the entry ranking: is a lower score more attractive
/// (e.g. "most oversold") or a higher one (e.g. "largest move")?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOrder {
    LowestFirst,
    HighestFirst,
}

/// How the protective stop level is derived at entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopSource {
    /// `stop_loss_pct` percent below (long) or above (short) the fill price.
    Percent,
    /// A multiple of ATR away from the fill price. Falls back to the
    /// percent stop when the ATR is not yet available.
    AtrMultiple { period: usize, multiple: f64 },
}

#[derive(Debug, Clone)]
pub struct StrategyRule {
    pub id: StrategyId,
    pub name: String,
    pub entry: Rule,
    pub exit_signal: Rule,
    pub trend_filter: Option<Rule>,
    pub rank_by: Operand,
    pub rank_order: RankOrder,
    /// Fraction of available cash committed per entry, in (0, 1].
    pub position_size: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: Option<f64>,
    pub stop_source: StopSource,
    pub max_positions: usize,
    pub max_hold_minutes: Option<i64>,
    /// Hard intraday deadline; open positions are force-closed at or
    /// after this time regardless of signals.
    pub session_end: NaiveTime,
    pub initial_capital: f64,
}

impl StrategyRule {
    /// Every indicator this strategy needs computed each cycle.
    pub fn indicator_ids(&self) -> Vec<IndicatorId> {
        let mut ids = Vec::new();
        self.entry.collect_indicators(&mut ids);
        self.exit_signal.collect_indicators(&mut ids);
        if let Some(filter) = &self.trend_filter {
            filter.collect_indicators(&mut ids);
        }
        self.rank_by.collect_indicators(&mut ids);
        if let StopSource::AtrMultiple { period, .. } = self.stop_source {
            let atr = IndicatorId::Atr(period);
            if !ids.contains(&atr) {
                ids.push(atr);
            }
        }
        ids
    }

    /// Stop level for a fill at `entry_price`. `quantity` carries the
    /// direction; the stop sits on the losing side of the fill.
    pub fn stop_price(&self, entry_price: f64, quantity: i64, snapshot: &Snapshot) -> f64 {
        let long = quantity >= 0;
        if let StopSource::AtrMultiple { period, multiple } = self.stop_source
            && let Some(atr) = snapshot.get(&IndicatorId::Atr(period), IndicatorField::Value)
        {
            return if long {
                entry_price - multiple * atr
            } else {
                entry_price + multiple * atr
            };
        }
        if long {
            entry_price * (1.0 - self.stop_loss_pct / 100.0)
        } else {
            entry_price * (1.0 + self.stop_loss_pct / 100.0)
        }
    }

    pub fn take_profit_price(&self, entry_price: f64, quantity: i64) -> Option<f64> {
        self.take_profit_pct.map(|pct| {
            if quantity >= 0 {
                entry_price * (1.0 + pct / 100.0)
            } else {
                entry_price * (1.0 - pct / 100.0)
            }
        })
    }

    /// Startup validation; any failure here is fatal before the first cycle.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |reason: &str| {
            Err(EngineError::InvalidStrategy {
                name: self.name.clone(),
                reason: reason.to_string(),
            })
        };
        if self.position_size <= 0.0 || self.position_size > 1.0 {
            return fail("position_size must be in (0, 1]");
        }
        if self.max_positions == 0 {
            return fail("max_positions must be at least 1");
        }
        if self.stop_loss_pct < 0.0 {
            return fail("stop_loss_pct must not be negative");
        }
        if self.take_profit_pct.is_some_and(|p| p <= 0.0) {
            return fail("take_profit_pct must be positive when set");
        }
        if self.initial_capital <= 0.0 {
            return fail("initial_capital must be positive");
        }
        if let StopSource::AtrMultiple { period, multiple } = self.stop_source {
            if period == 0 {
                return fail("atr stop period must be at least 1");
            }
            if multiple <= 0.0 {
                return fail("atr stop multiple must be positive");
            }
        }
        if self.max_hold_minutes.is_some_and(|m| m <= 0) {
            return fail("max_hold_minutes must be positive when set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;
    use crate::domain::indicator::IndicatorValue;
    use crate::domain::rule::{CmpOp, IndicatorRef};
    use chrono::NaiveDate;

    fn sample_strategy() -> StrategyRule {
        StrategyRule {
            id: StrategyId("crsi".into()),
            name: "ConnorsRSI mean reversion".into(),
            entry: Rule::Compare {
                left: Operand::Indicator(IndicatorRef {
                    id: IndicatorId::ConnorsRsi {
                        rsi: 3,
                        streak: 2,
                        rank: 100,
                    },
                    field: IndicatorField::Value,
                }),
                op: CmpOp::Le,
                right: Operand::Constant(10.0),
            },
            exit_signal: Rule::Compare {
                left: Operand::Indicator(IndicatorRef {
                    id: IndicatorId::ConnorsRsi {
                        rsi: 3,
                        streak: 2,
                        rank: 100,
                    },
                    field: IndicatorField::Value,
                }),
                op: CmpOp::Ge,
                right: Operand::Constant(70.0),
            },
            trend_filter: Some(Rule::Compare {
                left: Operand::Close,
                op: CmpOp::Gt,
                right: Operand::Indicator(IndicatorRef {
                    id: IndicatorId::Sma(200),
                    field: IndicatorField::Value,
                }),
            }),
            rank_by: Operand::Indicator(IndicatorRef {
                id: IndicatorId::ConnorsRsi {
                    rsi: 3,
                    streak: 2,
                    rank: 100,
                },
                field: IndicatorField::Value,
            }),
            rank_order: RankOrder::LowestFirst,
            position_size: 0.25,
            stop_loss_pct: 2.0,
            take_profit_pct: Some(3.0),
            stop_source: StopSource::Percent,
            max_positions: 4,
            max_hold_minutes: Some(240),
            session_end: NaiveTime::from_hms_opt(15, 50, 0).unwrap(),
            initial_capital: 100_000.0,
        }
    }

    fn snapshot_with_atr(atr: Option<f64>) -> Snapshot {
        let bar = Bar {
            symbol: "AAPL".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1000,
        };
        let mut snapshot = Snapshot::new(bar);
        snapshot.insert(IndicatorId::Atr(14), atr.map(IndicatorValue::Simple));
        snapshot
    }

    #[test]
    fn indicator_ids_cover_all_rules() {
        let ids = sample_strategy().indicator_ids();
        assert!(ids.contains(&IndicatorId::ConnorsRsi {
            rsi: 3,
            streak: 2,
            rank: 100,
        }));
        assert!(ids.contains(&IndicatorId::Sma(200)));
        // deduplicated: entry, exit and rank_by share the composite
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn atr_stop_added_to_indicator_ids() {
        let mut s = sample_strategy();
        s.stop_source = StopSource::AtrMultiple {
            period: 14,
            multiple: 2.0,
        };
        assert!(s.indicator_ids().contains(&IndicatorId::Atr(14)));
    }

    #[test]
    fn percent_stop_sides() {
        let s = sample_strategy();
        let snapshot = snapshot_with_atr(None);
        assert!((s.stop_price(100.0, 10, &snapshot) - 98.0).abs() < 1e-9);
        assert!((s.stop_price(100.0, -10, &snapshot) - 102.0).abs() < 1e-9);
    }

    #[test]
    fn atr_stop_with_fallback() {
        let mut s = sample_strategy();
        s.stop_source = StopSource::AtrMultiple {
            period: 14,
            multiple: 2.0,
        };
        let with_atr = snapshot_with_atr(Some(1.5));
        assert!((s.stop_price(100.0, 10, &with_atr) - 97.0).abs() < 1e-9);

        // ATR not warmed up yet: percent stop takes over
        let without = snapshot_with_atr(None);
        assert!((s.stop_price(100.0, 10, &without) - 98.0).abs() < 1e-9);
    }

    #[test]
    fn take_profit_sides() {
        let s = sample_strategy();
        assert!((s.take_profit_price(100.0, 10).unwrap() - 103.0).abs() < 1e-9);
        assert!((s.take_profit_price(100.0, -10).unwrap() - 97.0).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_nonsense() {
        let mut s = sample_strategy();
        s.position_size = 0.0;
        assert!(s.validate().is_err());

        let mut s = sample_strategy();
        s.position_size = 1.5;
        assert!(s.validate().is_err());

        let mut s = sample_strategy();
        s.max_positions = 0;
        assert!(s.validate().is_err());

        let mut s = sample_strategy();
        s.stop_loss_pct = -1.0;
        assert!(s.validate().is_err());

        assert!(sample_strategy().validate().is_ok());
    }
}
