//! Core domain types and logic.

pub mod trade;
pub mod features;
pub mod signal;
pub mod position;
pub mod state_machine;
pub mod ledger;
pub mod backtest;
pub mod summary;
pub mod config_validation;
pub mod error;
