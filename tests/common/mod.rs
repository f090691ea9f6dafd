#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use flowtrader::domain::error::FlowtraderError;
use flowtrader::domain::signal::{Signal, SignalGenerator};
pub use flowtrader::domain::trade::{EnrichedTrade, Side, Trade};
use flowtrader::ports::trade_port::TradePort;
use std::io::Write;

pub struct MockTradePort {
    pub trades: Vec<Trade>,
    pub error: Option<String>,
}

impl MockTradePort {
    pub fn new(trades: Vec<Trade>) -> Self {
        Self {
            trades,
            error: None,
        }
    }

    pub fn failing(column: &str) -> Self {
        Self {
            trades: Vec::new(),
            error: Some(column.to_string()),
        }
    }
}

impl TradePort for MockTradePort {
    fn load_trades(&self) -> Result<Vec<Trade>, FlowtraderError> {
        if let Some(column) = &self.error {
            return Err(FlowtraderError::MissingColumn {
                column: column.clone(),
            });
        }
        Ok(self.trades.clone())
    }
}

/// Replays a fixed list of signals, one per row, then stays flat.
pub struct ScriptedSignals {
    signals: Vec<Signal>,
    next: usize,
}

impl ScriptedSignals {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self { signals, next: 0 }
    }
}

impl SignalGenerator for ScriptedSignals {
    fn evaluate(&mut self, _trade: &EnrichedTrade) -> Signal {
        let s = self.signals.get(self.next).copied().unwrap_or(Signal::Flat);
        self.next += 1;
        s
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 20, 18, 0, 0).unwrap()
}

pub fn make_trade(i: i64, price: f64, volume: f64, side: Side) -> Trade {
    Trade {
        time: start_time() + Duration::seconds(i),
        price,
        volume,
        side,
    }
}

/// Trades at the given prices, all unit-volume buys.
pub fn trades_at(prices: &[f64]) -> Vec<Trade> {
    prices
        .iter()
        .enumerate()
        .map(|(i, p)| make_trade(i as i64, *p, 1.0, Side::Buy))
        .collect()
}

/// Trade CSV in the exchange fetcher's layout: epoch seconds plus a
/// datetime column the engine ignores.
pub fn trades_csv(rows: &[(f64, f64, Side)]) -> String {
    let mut out = String::from("time,price,volume,side,datetime\n");
    for (i, (price, volume, side)) in rows.iter().enumerate() {
        let secs = 1_763_661_600 + i as i64;
        out.push_str(&format!(
            "{}.5,{},{},{},2025-11-20 18:00:{:02}.5\n",
            secs,
            price,
            volume,
            side,
            i % 60
        ));
    }
    out
}

pub fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
