//! Minute-resolution OHLCV bar representation.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Trading session this bar belongs to.
    pub fn session_date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Validate a per-symbol bar series before any indicator computation.
///
/// Bars must be for a single symbol, strictly ascending by timestamp
/// (duplicates rejected), with non-negative volume and open/close inside
/// the low..=high range. Gaps between minutes are legal: the feed drops
/// minutes with no trades.
pub fn validate_series(bars: &[Bar]) -> Result<(), EngineError> {
    let Some(first) = bars.first() else {
        return Ok(());
    };

    for (i, bar) in bars.iter().enumerate() {
        if bar.symbol != first.symbol {
            return Err(EngineError::MalformedSeries {
                symbol: first.symbol.clone(),
                reason: format!("mixed symbols: found {} at index {}", bar.symbol, i),
            });
        }
        if bar.volume < 0 {
            return Err(EngineError::MalformedSeries {
                symbol: bar.symbol.clone(),
                reason: format!("negative volume {} at {}", bar.volume, bar.timestamp),
            });
        }
        let range_ok = bar.low <= bar.high
            && bar.low <= bar.open
            && bar.open <= bar.high
            && bar.low <= bar.close
            && bar.close <= bar.high;
        if !range_ok {
            return Err(EngineError::MalformedSeries {
                symbol: bar.symbol.clone(),
                reason: format!(
                    "inconsistent range at {}: open {} high {} low {} close {}",
                    bar.timestamp, bar.open, bar.high, bar.low, bar.close
                ),
            });
        }
        if i > 0 {
            let prev = &bars[i - 1];
            if bar.timestamp == prev.timestamp {
                return Err(EngineError::MalformedSeries {
                    symbol: bar.symbol.clone(),
                    reason: format!("duplicate timestamp {}", bar.timestamp),
                });
            }
            if bar.timestamp < prev.timestamp {
                return Err(EngineError::MalformedSeries {
                    symbol: bar.symbol.clone(),
                    reason: format!(
                        "out-of-order timestamp {} after {}",
                        bar.timestamp, prev.timestamp
                    ),
                });
            }
        }
    }

    Ok(())
}
