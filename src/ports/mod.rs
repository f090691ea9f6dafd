//! Port traits separating the backtest core from file formats.

pub mod config_port;
pub mod ledger_port;
pub mod trade_port;
