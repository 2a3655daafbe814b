//! Concrete adapter implementations for ports.

pub mod csv_bars;
pub mod ini_config;
pub mod log_journal;
pub mod paper_gateway;
pub mod price_board;
