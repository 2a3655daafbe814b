//! ATR (Average True Range) with Wilder's smoothing.
//!
//! Seed at bar period-1 is the simple mean of the first `period` true
//! ranges (the first bar's true range is high - low); thereafter
//! `atr = (prev_atr * (n-1) + tr) / n`. Feeds ATR-derived stop levels.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue};

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    let id = IndicatorId::Atr(period);
    if period == 0 || bars.len() < period {
        return IndicatorSeries::unavailable(id, bars.iter().map(|b| b.timestamp));
    }

    let mut tr_values = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };
        tr_values.push(tr);
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i + 1 < period {
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                value: None,
            });
            continue;
        }

        if i + 1 == period {
            atr = tr_values[..period].iter().sum::<f64>() / period as f64;
        } else {
            atr = (atr * (period - 1) as f64 + tr_values[i]) / period as f64;
        }
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            value: Some(IndicatorValue::Simple(atr)),
        });
    }

    IndicatorSeries { id, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_bar(minute: u32, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: "TEST".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
                + chrono::Duration::minutes(minute as i64),
            open: close,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn atr_warmup_and_seed() {
        let bars = vec![
            make_bar(0, 110.0, 100.0, 105.0),
            make_bar(1, 115.0, 105.0, 110.0),
            make_bar(2, 120.0, 110.0, 115.0),
        ];
        let series = calculate_atr(&bars, 3);
        assert!(series.values[0].value.is_none());
        assert!(series.values[1].value.is_none());
        assert_relative_eq!(series.simple_at(2).unwrap(), 10.0);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let bars = vec![
            make_bar(0, 110.0, 100.0, 105.0),
            make_bar(1, 115.0, 105.0, 110.0),
            make_bar(2, 120.0, 110.0, 115.0),
            make_bar(3, 125.0, 115.0, 120.0),
        ];
        let series = calculate_atr(&bars, 3);
        // seed 10, next tr 10: (10*2 + 10) / 3 = 10
        assert_relative_eq!(series.simple_at(3).unwrap(), 10.0);
    }

    #[test]
    fn atr_gap_widens_range() {
        let bars = vec![
            make_bar(0, 102.0, 98.0, 100.0),
            // gap up: true range measured against prior close
            make_bar(1, 132.0, 128.0, 130.0),
        ];
        let series = calculate_atr(&bars, 2);
        // tr0 = 4, tr1 = max(4, |132-100|, |128-100|) = 32 → (4+32)/2 = 18
        assert_relative_eq!(series.simple_at(1).unwrap(), 18.0);
    }

    #[test]
    fn atr_insufficient_bars() {
        let bars = vec![make_bar(0, 110.0, 90.0, 100.0)];
        let series = calculate_atr(&bars, 5);
        assert!(series.values.iter().all(|p| p.value.is_none()));
    }
}
