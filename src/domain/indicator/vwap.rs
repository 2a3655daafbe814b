//! Session-anchored VWAP (volume-weighted average price).
//!
//! Accumulates typical_price * volume and volume from the first bar of a
//! trading session onward, and resets both accumulators at every session
//! boundary. Carrying yesterday's accumulator into today is a correctness
//! bug: the whole point of VWAP is "today's average paid price".
//!
//! A zero-volume session start yields an unavailable point until the first
//! traded bar of the session.

use chrono::NaiveDate;

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorId, IndicatorPoint, IndicatorSeries, IndicatorValue};

/// Incremental VWAP accumulator, state-in/state-out for streaming use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VwapState {
    pub session: NaiveDate,
    pub pv_sum: f64,
    pub vol_sum: f64,
}

/// Advance VWAP state by one bar, resetting on session change.
/// Returns the updated state and the current VWAP value if defined.
pub fn vwap_next(state: Option<VwapState>, bar: &Bar) -> (VwapState, Option<f64>) {
    let mut state = match state {
        Some(s) if s.session == bar.session_date() => s,
        _ => VwapState {
            session: bar.session_date(),
            pv_sum: 0.0,
            vol_sum: 0.0,
        },
    };

    state.pv_sum += bar.typical_price() * bar.volume as f64;
    state.vol_sum += bar.volume as f64;

    let value = if state.vol_sum > 0.0 {
        Some(state.pv_sum / state.vol_sum)
    } else {
        None
    };
    (state, value)
}

pub fn calculate_vwap(bars: &[Bar]) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut state: Option<VwapState> = None;

    for bar in bars {
        let (next, value) = vwap_next(state, bar);
        state = Some(next);
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            value: value.map(IndicatorValue::Simple),
        });
    }

    IndicatorSeries {
        id: IndicatorId::Vwap,
        values,
    }
}
