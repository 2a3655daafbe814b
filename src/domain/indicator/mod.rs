//! Technical indicator implementations.
//!
//! Types for representing indicator identity and values:
//! - `IndicatorId`: indicator identity + parameters (serves as HashMap key)
//! - `IndicatorValue`: output shapes (single value or derived candle)
//! - `IndicatorPoint`: one point in an indicator time series; `None` means
//!   the value does not exist yet (insufficient history), which callers
//!   must branch on — there is no numeric stand-in for "no data"
//! - `IndicatorSeries`: a time series of indicator points

pub mod sma;
pub mod ema;
pub mod wma;
pub mod rsi;
pub mod roc;
pub mod atr;
pub mod vwap;
pub mod heikin_ashi;
pub mod percent_rank;
pub mod connors;

use chrono::NaiveDateTime;
use std::fmt;

/// Pre-fill behavior for rank/percentile indicators: what to report while
/// the trailing window is still accumulating history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankSeed {
    /// Report unavailable until the window is full.
    Skip,
    /// Report a documented neutral default (stored as value * 100 to keep
    /// the id hashable; 5000 means 50.0).
    NeutralX100(u32),
}

impl RankSeed {
    pub fn neutral(value: f64) -> Self {
        RankSeed::NeutralX100((value * 100.0).round() as u32)
    }

    pub fn as_value(&self) -> Option<f64> {
        match self {
            RankSeed::Skip => None,
            RankSeed::NeutralX100(x) => Some(*x as f64 / 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorId {
    Sma(usize),
    Ema(usize),
    Wma(usize),
    Rsi(usize),
    Roc(usize),
    Atr(usize),
    Vwap,
    HeikinAshi,
    PercentRank { period: usize, seed: RankSeed },
    ConnorsRsi {
        rsi: usize,
        streak: usize,
        rank: usize,
    },
}

impl IndicatorId {
    /// Minimum raw bars required before this indicator produces a value.
    pub fn min_bars(&self) -> usize {
        match self {
            IndicatorId::Sma(n) | IndicatorId::Wma(n) | IndicatorId::Ema(n) => *n,
            IndicatorId::Rsi(n) | IndicatorId::Roc(n) => n + 1,
            IndicatorId::Atr(n) => *n,
            IndicatorId::Vwap => 1,
            IndicatorId::HeikinAshi => 1,
            IndicatorId::PercentRank { period, seed } => match seed {
                RankSeed::Skip => period + 1,
                RankSeed::NeutralX100(_) => 2,
            },
            // Composite: available as soon as one constituent is, with
            // unavailable constituents coalesced to the documented neutral.
            IndicatorId::ConnorsRsi { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Candle {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// Which field of a multi-value indicator to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Value,
    CandleOpen,
    CandleHigh,
    CandleLow,
    CandleClose,
}

impl IndicatorValue {
    pub fn field(&self, field: IndicatorField) -> Option<f64> {
        match (self, field) {
            (IndicatorValue::Simple(v), IndicatorField::Value) => Some(*v),
            (IndicatorValue::Candle { open, .. }, IndicatorField::CandleOpen) => Some(*open),
            (IndicatorValue::Candle { high, .. }, IndicatorField::CandleHigh) => Some(*high),
            (IndicatorValue::Candle { low, .. }, IndicatorField::CandleLow) => Some(*low),
            (IndicatorValue::Candle { close, .. }, IndicatorField::CandleClose) => Some(*close),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    /// `None` means insufficient history at this point, not zero.
    pub value: Option<IndicatorValue>,
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub id: IndicatorId,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn unavailable(id: IndicatorId, timestamps: impl Iterator<Item = NaiveDateTime>) -> Self {
        IndicatorSeries {
            id,
            values: timestamps
                .map(|timestamp| IndicatorPoint {
                    timestamp,
                    value: None,
                })
                .collect(),
        }
    }

    /// Latest point's value, if the series has one and it is available.
    pub fn last_value(&self) -> Option<IndicatorValue> {
        self.values.last().and_then(|p| p.value)
    }

    /// Simple value at index, if available.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .and_then(|p| p.value)
            .and_then(|v| v.field(IndicatorField::Value))
    }
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorId::Sma(period) => write!(f, "SMA({})", period),
            IndicatorId::Ema(period) => write!(f, "EMA({})", period),
            IndicatorId::Wma(period) => write!(f, "WMA({})", period),
            IndicatorId::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorId::Roc(period) => write!(f, "ROC({})", period),
            IndicatorId::Atr(period) => write!(f, "ATR({})", period),
            IndicatorId::Vwap => write!(f, "VWAP"),
            IndicatorId::HeikinAshi => write!(f, "HEIKIN_ASHI"),
            IndicatorId::PercentRank { period, .. } => write!(f, "PERCENT_RANK({})", period),
            IndicatorId::ConnorsRsi { rsi, streak, rank } => {
                write!(f, "CONNORS_RSI({},{},{})", rsi, streak, rank)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display() {
        assert_eq!(IndicatorId::Sma(20).to_string(), "SMA(20)");
        assert_eq!(IndicatorId::Vwap.to_string(), "VWAP");
        assert_eq!(
            IndicatorId::ConnorsRsi {
                rsi: 3,
                streak: 2,
                rank: 100
            }
            .to_string(),
            "CONNORS_RSI(3,2,100)"
        );
    }

    #[test]
    fn id_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(IndicatorId::Sma(20), 1);
        map.insert(IndicatorId::Sma(50), 2);
        map.insert(
            IndicatorId::PercentRank {
                period: 100,
                seed: RankSeed::Skip,
            },
            3,
        );

        assert_eq!(map.get(&IndicatorId::Sma(20)), Some(&1));
        assert_eq!(
            map.get(&IndicatorId::PercentRank {
                period: 100,
                seed: RankSeed::Skip,
            }),
            Some(&3)
        );
    }

    #[test]
    fn min_bars_per_indicator() {
        assert_eq!(IndicatorId::Sma(20).min_bars(), 20);
        assert_eq!(IndicatorId::Rsi(2).min_bars(), 3);
        assert_eq!(IndicatorId::Vwap.min_bars(), 1);
        assert_eq!(
            IndicatorId::PercentRank {
                period: 100,
                seed: RankSeed::Skip,
            }
            .min_bars(),
            101
        );
    }

    #[test]
    fn candle_field_extraction() {
        let candle = IndicatorValue::Candle {
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
        };
        assert_eq!(candle.field(IndicatorField::CandleClose), Some(1.5));
        assert_eq!(candle.field(IndicatorField::Value), None);

        let simple = IndicatorValue::Simple(42.0);
        assert_eq!(simple.field(IndicatorField::Value), Some(42.0));
        assert_eq!(simple.field(IndicatorField::CandleOpen), None);
    }

    #[test]
    fn rank_seed_round_trip() {
        assert_eq!(RankSeed::Skip.as_value(), None);
        assert_eq!(RankSeed::neutral(50.0).as_value(), Some(50.0));
    }
}
