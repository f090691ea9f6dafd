//! Concrete adapter implementations for ports.

pub mod csv_ledger_adapter;
pub mod csv_support;
pub mod csv_trade_adapter;
pub mod file_config_adapter;
