//! Linearly weighted moving average.
//!
//! Most recent close carries weight `period`, the oldest weight 1.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue};

pub fn calculate_wma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let id = IndicatorId::Wma(period);
    if period == 0 {
        return IndicatorSeries::unavailable(id, bars.iter().map(|b| b.timestamp));
    }

    let denominator = (period * (period + 1)) as f64 / 2.0;
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        if i + 1 < period {
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                value: None,
            });
            continue;
        }

        let window = &bars[i + 1 - period..=i];
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(j, b)| b.close * (j + 1) as f64)
            .sum();
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            value: Some(IndicatorValue::Simple(weighted / denominator)),
        });
    }

    IndicatorSeries { id, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_bar(minute: u32, close: f64) -> Bar {
        Bar {
            symbol: "TEST".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
                + chrono::Duration::minutes(minute as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn wma_weights_recent_closes_heavier() {
        let bars: Vec<Bar> = [10.0, 20.0, 30.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar(i as u32, c))
            .collect();
        let series = calculate_wma(&bars, 3);
        // (10*1 + 20*2 + 30*3) / 6 = 140/6
        assert_relative_eq!(series.simple_at(2).unwrap(), 140.0 / 6.0);
    }

    #[test]
    fn wma_warmup() {
        let bars: Vec<Bar> = (0..5).map(|i| make_bar(i, 100.0)).collect();
        let series = calculate_wma(&bars, 4);
        assert!(series.values[2].value.is_none());
        assert_relative_eq!(series.simple_at(3).unwrap(), 100.0);
    }

    #[test]
    fn wma_flat_equals_close() {
        let bars: Vec<Bar> = (0..6).map(|i| make_bar(i, 42.0)).collect();
        let series = calculate_wma(&bars, 3);
        for i in 2..6 {
            assert_relative_eq!(series.simple_at(i).unwrap(), 42.0);
        }
    }
}
