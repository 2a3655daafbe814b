//! Shared last-trade marks for paper execution.
//!
//! The bar source posts the latest close it has served for each symbol;
//! the paper gateway fills orders against those marks. Cloning the board
//! clones the handle, not the data.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mark {
    pub price: f64,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct PriceBoard {
    marks: Arc<Mutex<HashMap<String, Mark>>>,
}

impl PriceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, symbol: &str, price: f64, timestamp: NaiveDateTime) {
        if let Ok(mut marks) = self.marks.lock() {
            marks.insert(symbol.to_string(), Mark { price, timestamp });
        }
    }

    pub fn last(&self, symbol: &str) -> Option<Mark> {
        self.marks.lock().ok()?.get(symbol).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn post_then_read_back() {
        let board = PriceBoard::new();
        let ts = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        board.post("AAA", 12.5, ts);
        let mark = board.last("AAA").unwrap();
        assert_eq!(mark.price, 12.5);
        assert_eq!(mark.timestamp, ts);
        assert!(board.last("BBB").is_none());
    }

    #[test]
    fn clones_share_marks() {
        let board = PriceBoard::new();
        let handle = board.clone();
        let ts = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        handle.post("AAA", 9.0, ts);
        assert_eq!(board.last("AAA").unwrap().price, 9.0);
    }
}
