//! Percent rank of the current 1-bar return against a trailing window.
//!
//! The trailing window is a fixed-capacity ring buffer of prior returns,
//! evicting the oldest as new ones arrive. The rank is the percentage of
//! stored returns strictly below the current one (0..=100).
//!
//! Behavior before the window fills is a configuration decision
//! ([`RankSeed`]): `Skip` reports unavailable, `NeutralX100` reports the
//! documented default value.

use std::collections::VecDeque;

use crate::domain::bar::Bar;
use crate::domain::indicator::{
    IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue, RankSeed,
};

/// Bounded buffer of trailing returns, one per symbol per rank indicator.
#[derive(Debug, Clone)]
pub struct RankWindow {
    returns: VecDeque<f64>,
    capacity: usize,
}

impl RankWindow {
    pub fn new(capacity: usize) -> Self {
        RankWindow {
            returns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn is_full(&self) -> bool {
        self.returns.len() == self.capacity
    }

    /// Rank `current` against the stored returns, without inserting it.
    pub fn rank(&self, current: f64) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        let below = self.returns.iter().filter(|&&r| r < current).count();
        Some(below as f64 / self.capacity as f64 * 100.0)
    }

    /// Insert a return, evicting the oldest when at capacity.
    pub fn push(&mut self, value: f64) {
        if self.returns.len() == self.capacity {
            self.returns.pop_front();
        }
        self.returns.push_back(value);
    }
}

pub fn calculate_percent_rank(bars: &[Bar], period: usize, seed: RankSeed) -> IndicatorSeries {
    let id = IndicatorId::PercentRank { period, seed };
    if period == 0 {
        return IndicatorSeries::unavailable(id, bars.iter().map(|b| b.timestamp));
    }

    let mut window = RankWindow::new(period);
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                value: None,
            });
            continue;
        }

        let prev_close = bars[i - 1].close;
        if prev_close == 0.0 {
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                value: None,
            });
            continue;
        }
        let current = bar.close / prev_close - 1.0;

        let value = window.rank(current).or_else(|| seed.as_value());
        window.push(current);

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            value: value.map(IndicatorValue::Simple),
        });
    }

    IndicatorSeries { id, values }
}
