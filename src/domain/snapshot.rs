//! Per-symbol indicator snapshot at one evaluation instant.
//!
//! Bars remain the source of truth; a snapshot is derived state recomputed
//! or incrementally updated every cycle. Availability is explicit: a
//! lookup for an indicator that has insufficient history returns `None`,
//! never a numeric stand-in.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorField, IndicatorId, IndicatorValue};

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    /// The bar this snapshot was taken from, for price-field operands.
    pub bar: Bar,
    values: HashMap<IndicatorId, IndicatorValue>,
}

impl Snapshot {
    pub fn new(bar: Bar) -> Self {
        Snapshot {
            symbol: bar.symbol.clone(),
            timestamp: bar.timestamp,
            bar,
            values: HashMap::new(),
        }
    }

    /// Record an indicator value. Unavailable values are simply absent.
    pub fn insert(&mut self, id: IndicatorId, value: Option<IndicatorValue>) {
        if let Some(value) = value {
            self.values.insert(id, value);
        }
    }

    pub fn get(&self, id: &IndicatorId, field: IndicatorField) -> Option<f64> {
        self.values.get(id).and_then(|v| v.field(field))
    }

    pub fn has(&self, id: &IndicatorId) -> bool {
        self.values.contains_key(id)
    }
}
