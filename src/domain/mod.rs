//! Core domain types and logic.

pub mod bar;
pub mod indicator;
pub mod snapshot;
pub mod engine;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod signal;
pub mod strategy;
pub mod position;
pub mod ledger;
pub mod cycle;
pub mod error;
