//! ConnorsRSI composite.
//!
//! Average of three constituents:
//! 1. RSI(rsi) of closes
//! 2. RSI(streak) of the up/down streak series (consecutive up closes
//!    count +1, +2, ...; down closes -1, -2, ...; an unchanged close
//!    resets the streak to 0)
//! 3. Percent rank of the 1-bar return against the trailing rank window
//!
//! A constituent that is unavailable (still warming up) is coalesced to
//! the neutral 50.0 and the divisor stays 3. That choice is deliberate and
//! documented: dropping the constituent from the average without adjusting
//! the divisor silently reweights the others. The composite itself is
//! unavailable only while no constituent is ready at all.

use crate::domain::bar::Bar;
use crate::domain::indicator::rsi::{calculate_rsi, rsi_over_closes};
use crate::domain::indicator::percent_rank::calculate_percent_rank;
use crate::domain::indicator::{
    IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue, RankSeed,
};

const NEUTRAL: f64 = 50.0;

fn streak_series(bars: &[Bar]) -> Vec<f64> {
    let mut streaks = Vec::with_capacity(bars.len());
    let mut streak = 0i64;
    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            streaks.push(0.0);
            continue;
        }
        let prev_close = bars[i - 1].close;
        streak = if bar.close > prev_close {
            if streak > 0 { streak + 1 } else { 1 }
        } else if bar.close < prev_close {
            if streak < 0 { streak - 1 } else { -1 }
        } else {
            0
        };
        streaks.push(streak as f64);
    }
    streaks
}

pub fn calculate_connors_rsi(
    bars: &[Bar],
    rsi_period: usize,
    streak_period: usize,
    rank_period: usize,
) -> IndicatorSeries {
    let id = IndicatorId::ConnorsRsi {
        rsi: rsi_period,
        streak: streak_period,
        rank: rank_period,
    };
    if bars.len() < 2 || rsi_period == 0 || streak_period == 0 || rank_period == 0 {
        return IndicatorSeries::unavailable(id, bars.iter().map(|b| b.timestamp));
    }

    let price_rsi = calculate_rsi(bars, rsi_period);
    let streak_rsi = rsi_over_closes(
        IndicatorId::Rsi(streak_period),
        bars.iter()
            .map(|b| b.timestamp)
            .zip(streak_series(bars))
            .collect(),
        streak_period,
    );
    let rank = calculate_percent_rank(bars, rank_period, RankSeed::Skip);

    let mut values = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let components = [
            price_rsi.simple_at(i),
            streak_rsi.simple_at(i),
            rank.simple_at(i),
        ];

        let value = if components.iter().all(|c| c.is_none()) {
            None
        } else {
            let sum: f64 = components.iter().map(|c| c.unwrap_or(NEUTRAL)).sum();
            Some(IndicatorValue::Simple(sum / 3.0))
        };

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            value,
        });
    }

    IndicatorSeries { id, values }
}
