//! Exponential moving average.
//!
//! Seeded with the SMA of the first `period` closes, then
//! `ema = close * k + prev_ema * (1 - k)` with `k = 2 / (period + 1)`.
//! Warmup: first period-1 points are unavailable.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue};

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    let id = IndicatorId::Ema(period);
    if period == 0 || bars.len() < period {
        return IndicatorSeries::unavailable(id, bars.iter().map(|b| b.timestamp));
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut values = Vec::with_capacity(bars.len());
    let mut ema = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i + 1 < period {
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                value: None,
            });
            continue;
        }

        if i + 1 == period {
            ema = bars[..period].iter().map(|b| b.close).sum::<f64>() / period as f64;
        } else {
            ema = bar.close * k + ema * (1.0 - k);
        }
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            value: Some(IndicatorValue::Simple(ema)),
        });
    }

    IndicatorSeries { id, values }
}
