//! ROC (Rate of Change): percent change of close over the last n bars.
//!
//! Warmup: needs a close n bars back, so the first n points are unavailable.
//! A zero close n bars back yields an unavailable point rather than a
//! division blow-up.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue};

pub fn calculate_roc(bars: &[Bar], period: usize) -> IndicatorSeries {
    let id = IndicatorId::Roc(period);
    if period == 0 {
        return IndicatorSeries::unavailable(id, bars.iter().map(|b| b.timestamp));
    }

    let mut values = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let value = if i >= period {
            let base = bars[i - period].close;
            if base == 0.0 {
                None
            } else {
                Some(IndicatorValue::Simple((bar.close - base) / base * 100.0))
            }
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
