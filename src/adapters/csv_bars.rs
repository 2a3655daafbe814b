//! CSV bar source adapter.
//!
//! Reads intraday bars from a directory of per-symbol CSV files named
//! `{SYMBOL}.csv` with the header `timestamp,open,high,low,close,volume`.
//! Each file is loaded once, validated, and cached; subsequent fetches
//! serve the in-memory series filtered by the caller's watermark.

use crate::adapters::price_board::PriceBoard;
use crate::domain::bar::{validate_series, Bar};
use crate::domain::error::EngineError;
use crate::ports::bar_source::BarSource;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvBarSource {
    data_dir: PathBuf,
    cache: HashMap<String, Vec<Bar>>,
    board: Option<PriceBoard>,
}

impl CsvBarSource {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: HashMap::new(),
            board: None,
        }
    }

    /// Post the latest served close for each symbol so a paper gateway
    /// can fill against it.
    pub fn with_board(mut self, board: PriceBoard) -> Self {
        self.board = Some(board);
        self
    }

    fn load(&mut self, symbol: &str) -> Result<&[Bar], EngineError> {
        if !self.cache.contains_key(symbol) {
            let path = self.data_dir.join(format!("{}.csv", symbol));
            if !path.exists() {
                return Err(EngineError::NoData {
                    symbol: symbol.to_string(),
                });
            }
            let content = fs::read_to_string(&path)?;
            let bars = parse_csv(symbol, &content)?;
            self.cache.insert(symbol.to_string(), bars);
        }
        Ok(&self.cache[symbol])
    }
}

impl BarSource for CsvBarSource {
    fn fetch_bars(
        &mut self,
        symbol: &str,
        since: Option<NaiveDateTime>,
    ) -> Result<Vec<Bar>, EngineError> {
        let bars = self.load(symbol)?;
        let out: Vec<Bar> = match since {
            Some(watermark) => bars
                .iter()
                .filter(|b| b.timestamp > watermark)
                .cloned()
                .collect(),
            None => bars.to_vec(),
        };
        if let (Some(board), Some(last)) = (&self.board, out.last()) {
            board.post(symbol, last.close, last.timestamp);
        }
        Ok(out)
    }
}

fn parse_csv(symbol: &str, content: &str) -> Result<Vec<Bar>, EngineError> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| EngineError::MalformedSeries {
            symbol: symbol.to_string(),
            reason: format!("row {}: {}", i + 1, e),
        })?;

        let field = |n: usize, name: &str| -> Result<&str, EngineError> {
            record.get(n).ok_or_else(|| EngineError::MalformedSeries {
                symbol: symbol.to_string(),
                reason: format!("row {}: missing {} column", i + 1, name),
            })
        };

        let timestamp = NaiveDateTime::parse_from_str(field(0, "timestamp")?, TIMESTAMP_FORMAT)
            .map_err(|e| EngineError::MalformedSeries {
                symbol: symbol.to_string(),
                reason: format!("row {}: bad timestamp: {}", i + 1, e),
            })?;

        let price = |n: usize, name: &str| -> Result<f64, EngineError> {
            field(n, name)?
                .parse::<f64>()
                .map_err(|e| EngineError::MalformedSeries {
                    symbol: symbol.to_string(),
                    reason: format!("row {}: bad {}: {}", i + 1, name, e),
                })
        };

        let volume =
            field(5, "volume")?
                .parse::<i64>()
                .map_err(|e| EngineError::MalformedSeries {
                    symbol: symbol.to_string(),
                    reason: format!("row {}: bad volume: {}", i + 1, e),
                })?;

        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp,
            open: price(1, "open")?,
            high: price(2, "high")?,
            low: price(3, "low")?,
            close: price(4, "close")?,
            volume,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    validate_series(&bars)?;
    Ok(bars)
}
