//! Simple moving average.
//!
//! Warmup: first period-1 points are unavailable.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue};

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let id = IndicatorId::Sma(period);
    if period == 0 {
        return IndicatorSeries::unavailable(id, bars.iter().map(|b| b.timestamp));
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut window_sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        window_sum += bar.close;
        if i >= period {
            window_sum -= bars[i - period].close;
        }

        let value = if i + 1 >= period {
            Some(IndicatorValue::Simple(window_sum / period as f64))
        } else {
            None
        };
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            value,
        });
    }

    IndicatorSeries { id, values }
}
