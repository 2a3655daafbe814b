#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::Path;

/// Session date used by all fixtures.
pub fn trading_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

pub fn ts(hour: u32, minute: u32) -> NaiveDateTime {
    trading_day().and_hms_opt(hour, minute, 0).unwrap()
}

/// Write `{symbol}.csv` with one flat bar per (hour, minute, close).
pub fn write_closes(dir: &Path, symbol: &str, closes: &[(u32, u32, f64)]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for (hour, minute, close) in closes {
        content.push_str(&format!(
            "2024-03-04 {:02}:{:02}:00,{c},{c},{c},{c},1000\n",
            hour,
            minute,
            c = close
        ));
    }
    fs::write(dir.join(format!("{}.csv", symbol)), content).unwrap();
}

/// A minimal `[run]` section pointing at `data_dir`.
pub fn run_section(data_dir: &Path, universe: &str) -> String {
    format!(
        "[run]\ndata_dir = {}\nuniverse = {}\n",
        data_dir.display(),
        universe
    )
}

/// A dip-buying strategy section: enters when close is at or below
/// `threshold`, exits when it doubles.
pub fn dip_section(id: &str, threshold: f64, max_positions: usize) -> String {
    format!(
        "[strategy:{id}]\n\
         entry = close AT_MOST {threshold}\n\
         exit = close AT_LEAST {exit}\n\
         rank_by = close\n\
         rank_order = lowest\n\
         position_size = 0.5\n\
         stop_loss_pct = 2.0\n\
         max_positions = {max_positions}\n\
         session_end = 15:50\n\
         initial_capital = 1000\n",
        exit = threshold * 2.0,
    )
}
