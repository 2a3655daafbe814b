//! Streaming indicator engine.
//!
//! Keeps per-symbol bar history plus the O(1) incremental state needed by
//! the session-anchored indicators (Heikin-Ashi and VWAP cannot be rebuilt
//! from a truncated window, so their accumulators live here). Each cycle
//! the engine appends the newly fetched bars, advances the incremental
//! state, and produces one `Snapshot` per symbol. Symbols are independent,
//! so the per-symbol work fans out across the rayon pool.
//!
//! A malformed batch for one symbol is rejected whole and reported; it
//! never corrupts that symbol's retained history or touches other symbols.

use rayon::prelude::*;
use std::collections::HashMap;

use crate::domain::bar::{Bar, validate_series};
use crate::domain::error::EngineError;
use crate::domain::indicator::heikin_ashi::{HaCandle, ha_next};
use crate::domain::indicator::vwap::{VwapState, vwap_next};
use crate::domain::indicator::{
    IndicatorId, IndicatorValue, atr::calculate_atr, connors::calculate_connors_rsi,
    ema::calculate_ema, percent_rank::calculate_percent_rank, roc::calculate_roc,
    rsi::calculate_rsi, sma::calculate_sma, wma::calculate_wma,
};
use crate::domain::snapshot::Snapshot;

/// Result of one refresh pass. Symbols that failed validation are absent
/// from `snapshots` and explained in `errors`.
#[derive(Debug)]
pub struct RefreshReport {
    pub snapshots: HashMap<String, Snapshot>,
    pub errors: Vec<EngineError>,
}

pub struct IndicatorEngine {
    specs: Vec<IndicatorId>,
    states: HashMap<String, SymbolState>,
}

#[derive(Debug, Default)]
struct SymbolState {
    bars: Vec<Bar>,
    pending: Vec<Bar>,
    ha: Option<HaCandle>,
    vwap: Option<VwapState>,
}

impl IndicatorEngine {
    pub fn new(specs: Vec<IndicatorId>) -> Self {
        let mut deduped: Vec<IndicatorId> = Vec::new();
        for spec in specs {
            if !deduped.contains(&spec) {
                deduped.push(spec);
            }
        }
        IndicatorEngine {
            specs: deduped,
            states: HashMap::new(),
        }
    }

    /// Append newly fetched bars and recompute one snapshot per symbol.
    /// Symbols with no new bars this cycle still yield a snapshot from
    /// their retained history.
    pub fn refresh(&mut self, new_bars: HashMap<String, Vec<Bar>>) -> RefreshReport {
        for (symbol, bars) in new_bars {
            self.states.entry(symbol).or_default().pending.extend(bars);
        }

        let specs = &self.specs;
        let results: Vec<(String, Result<Option<Snapshot>, EngineError>)> = self
            .states
            .par_iter_mut()
            .map(|(symbol, state)| (symbol.clone(), state.advance(symbol, specs)))
            .collect();

        let mut snapshots = HashMap::new();
        let mut errors = Vec::new();
        for (symbol, result) in results {
            match result {
                Ok(Some(snapshot)) => {
                    snapshots.insert(symbol, snapshot);
                }
                Ok(None) => {}
                Err(err) => errors.push(err),
            }
        }
        RefreshReport { snapshots, errors }
    }

    /// Drop all retained state for a symbol, e.g. when it leaves the
    /// candidate universe.
    pub fn evict(&mut self, symbol: &str) {
        self.states.remove(symbol);
    }

    pub fn history_len(&self, symbol: &str) -> usize {
        self.states.get(symbol).map_or(0, |s| s.bars.len())
    }
}

impl SymbolState {
    fn advance(
        &mut self,
        symbol: &str,
        specs: &[IndicatorId],
    ) -> Result<Option<Snapshot>, EngineError> {
        if !self.pending.is_empty() {
            let pending = std::mem::take(&mut self.pending);
            self.check_batch(symbol, &pending)?;
            for bar in pending {
                self.ha = Some(ha_next(self.ha.as_ref(), &bar));
                let (vwap, _) = vwap_next(self.vwap, &bar);
                self.vwap = Some(vwap);
                self.bars.push(bar);
            }
        }

        let last = match self.bars.last() {
            Some(bar) => bar.clone(),
            None => return Ok(None),
        };

        let mut snapshot = Snapshot::new(last);
        for spec in specs {
            snapshot.insert(spec.clone(), self.compute(spec));
        }
        Ok(Some(snapshot))
    }

    /// A bad batch is rejected whole: retained history stays as it was.
    fn check_batch(&self, symbol: &str, batch: &[Bar]) -> Result<(), EngineError> {
        validate_series(batch)?;
        if batch.iter().any(|b| b.symbol != symbol) {
            return Err(EngineError::MalformedSeries {
                symbol: symbol.to_string(),
                reason: "batch contains bars for a different symbol".into(),
            });
        }
        if let (Some(tail), Some(head)) = (self.bars.last(), batch.first())
            && head.timestamp <= tail.timestamp
        {
            return Err(EngineError::MalformedSeries {
                symbol: symbol.to_string(),
                reason: format!(
                    "batch starts at {} but history already ends at {}",
                    head.timestamp, tail.timestamp
                ),
            });
        }
        Ok(())
    }

    fn compute(&self, spec: &IndicatorId) -> Option<IndicatorValue> {
        match spec {
            IndicatorId::Sma(n) => calculate_sma(&self.bars, *n).last_value(),
            IndicatorId::Ema(n) => calculate_ema(&self.bars, *n).last_value(),
            IndicatorId::Wma(n) => calculate_wma(&self.bars, *n).last_value(),
            IndicatorId::Rsi(n) => calculate_rsi(&self.bars, *n).last_value(),
            IndicatorId::Roc(n) => calculate_roc(&self.bars, *n).last_value(),
            IndicatorId::Atr(n) => calculate_atr(&self.bars, *n).last_value(),
            IndicatorId::Vwap => self.vwap.as_ref().and_then(|state| {
                if state.vol_sum > 0.0 {
                    Some(IndicatorValue::Simple(state.pv_sum / state.vol_sum))
                } else {
                    None
                }
            }),
            IndicatorId::HeikinAshi => self.ha.as_ref().map(|ha| IndicatorValue::Candle {
                open: ha.open,
                high: ha.high,
                low: ha.low,
                close: ha.close,
            }),
            IndicatorId::PercentRank { period, seed } => {
                calculate_percent_rank(&self.bars, *period, *seed).last_value()
            }
            IndicatorId::ConnorsRsi { rsi, streak, rank } => {
                calculate_connors_rsi(&self.bars, *rsi, *streak, *rank).last_value()
            }
        }
    }
}
