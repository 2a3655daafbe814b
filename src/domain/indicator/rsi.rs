//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//! - RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//!
//! Degenerate cases are distinguished rather than collapsed:
//! - avg_loss == 0, avg_gain > 0 (monotonic gains): 100
//! - avg_gain == 0, avg_loss > 0 (monotonic losses): 0
//! - avg_gain == 0 and avg_loss == 0 (flat prices): 50, the neutral
//!   midpoint. A flat series carries no directional information and must
//!   not read as maximally overbought.
//!
//! Warmup: needs n price changes, so the first n points are unavailable.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue};

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
}

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    let id = IndicatorId::Rsi(period);
    if period == 0 || bars.len() < period + 1 {
        return IndicatorSeries::unavailable(id, bars.iter().map(|b| b.timestamp));
    }

    rsi_over_closes(
        id,
        bars.iter().map(|b| (b.timestamp, b.close)).collect(),
        period,
    )
}

/// RSI over an arbitrary (timestamp, value) series. Shared with the
/// streak-RSI component of ConnorsRSI, which applies RSI to streak counts
/// rather than closes.
pub(crate) fn rsi_over_closes(
    id: IndicatorId,
    points: Vec<(chrono::NaiveDateTime, f64)>,
    period: usize,
) -> IndicatorSeries {
    let mut values = Vec::with_capacity(points.len());
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, &(timestamp, value)) in points.iter().enumerate() {
        if i < period {
            values.push(IndicatorPoint {
                timestamp,
                value: None,
            });
            if i > 0 {
                let change = value - points[i - 1].1;
                avg_gain += change.max(0.0);
                avg_loss += (-change).max(0.0);
            }
            continue;
        }

        let change = value - points[i - 1].1;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i == period {
            avg_gain = (avg_gain + gain) / period as f64;
            avg_loss = (avg_loss + loss) / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        }

        values.push(IndicatorPoint {
            timestamp,
            value: Some(IndicatorValue::Simple(rsi_from_averages(avg_gain, avg_loss))),
        });
    }

    IndicatorSeries { id, values }
}
