//! Heikin-Ashi derived candles.
//!
//! Recursive transform: each derived candle depends on the previous
//! derived candle, so the state is the previous output itself.
//!
//! - ha_close = (open + high + low + close) / 4
//! - ha_open  = (prev_ha_open + prev_ha_close) / 2, seeded with
//!   (open + close) / 2 on the first bar
//! - ha_high  = max(high, ha_open, ha_close)
//! - ha_low   = min(low, ha_open, ha_close)
//!
//! Both a batch form and an incremental state-in/state-out form are
//! provided; the incremental form is what the streaming engine uses so a
//! new bar costs O(1), not a full recompute.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue};

const FLAT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaCandle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl HaCandle {
    pub fn is_green(&self) -> bool {
        self.close > self.open
    }

    pub fn is_red(&self) -> bool {
        self.close < self.open
    }

    /// Green candle with no lower wick; a strong-trend continuation shape.
    pub fn is_flat_bottom(&self) -> bool {
        self.is_green() && (self.open - self.low).abs() < FLAT_EPSILON
    }

    /// Red candle with no upper wick.
    pub fn is_flat_top(&self) -> bool {
        self.is_red() && (self.high - self.open).abs() < FLAT_EPSILON
    }
}

/// Compute the next derived candle from the previous one and a raw bar.
pub fn ha_next(prev: Option<&HaCandle>, bar: &Bar) -> HaCandle {
    let close = (bar.open + bar.high + bar.low + bar.close) / 4.0;
    let open = match prev {
        Some(p) => (p.open + p.close) / 2.0,
        None => (bar.open + bar.close) / 2.0,
    };
    HaCandle {
        open,
        high: bar.high.max(open).max(close),
        low: bar.low.min(open).min(close),
        close,
    }
}

pub fn calculate_heikin_ashi(bars: &[Bar]) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut prev: Option<HaCandle> = None;

    for bar in bars {
        let candle = ha_next(prev.as_ref(), bar);
        prev = Some(candle);
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            value: Some(IndicatorValue::Candle {
                open: candle.open,
                high: candle.high,
                low: candle.low,
                close: candle.close,
            }),
        });
    }

    IndicatorSeries {
        id: IndicatorId::HeikinAshi,
        values,
    }
}
