//! CSV trade input and enriched-feature export.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::csv_support::{column_indices, field, line_of, parse_field, write_csv_atomically};
use crate::domain::error::FlowtraderError;
use crate::domain::trade::{EnrichedTrade, Side, Trade, format_timestamp, parse_timestamp};
use crate::ports::trade_port::TradePort;

pub const TRADE_COLUMNS: [&str; 4] = ["time", "price", "volume", "side"];

pub const FEATURE_COLUMNS: [&str; 11] = [
    "time",
    "price",
    "volume",
    "side",
    "buy_volume",
    "sell_volume",
    "volume_delta",
    "cvd",
    "rolling_buy_sum",
    "rolling_sell_sum",
    "order_imbalance",
];

pub struct CsvTradeAdapter {
    path: PathBuf,
}

impl CsvTradeAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TradePort for CsvTradeAdapter {
    fn load_trades(&self) -> Result<Vec<Trade>, FlowtraderError> {
        let file = File::open(&self.path).map_err(|e| FlowtraderError::Input {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let trades = read_trades(file)?;
        info!(path = %self.path.display(), trades = trades.len(), "loaded trades");
        Ok(trades)
    }
}

/// Parse trades from CSV with a header row.
///
/// Columns are found by name; extra columns are ignored. Every row must
/// parse, and rows come back stably sorted by time.
pub fn read_trades<R: Read>(reader: R) -> Result<Vec<Trade>, FlowtraderError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| FlowtraderError::malformed(1, format!("unreadable header: {}", e)))?
        .clone();
    let idx = column_indices(&headers, &TRADE_COLUMNS)?;

    let mut trades = Vec::new();
    for (n, result) in rdr.records().enumerate() {
        let fallback_line = n as u64 + 2;
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(fallback_line);
            FlowtraderError::malformed(line, format!("CSV parse error: {}", e))
        })?;
        let line = line_of(&record, fallback_line);
        trades.push(parse_trade(&record, &idx, line)?);
    }

    if trades.windows(2).any(|w| w[1].time < w[0].time) {
        warn!("trades were not in time order; sorting (ties keep input order)");
        trades.sort_by_key(|t| t.time);
    }
    Ok(trades)
}

fn parse_trade(
    record: &csv::StringRecord,
    idx: &[usize],
    line: u64,
) -> Result<Trade, FlowtraderError> {
    let raw_time = field(record, idx[0], "time", line)?;
    let time = parse_timestamp(raw_time).ok_or_else(|| {
        FlowtraderError::malformed(line, format!("invalid time value '{}'", raw_time))
    })?;

    let price: f64 = parse_field(record, idx[1], "price", line)?;
    if !price.is_finite() || price <= 0.0 {
        return Err(FlowtraderError::malformed(
            line,
            format!("price must be positive, got {}", price),
        ));
    }

    let volume: f64 = parse_field(record, idx[2], "volume", line)?;
    if !volume.is_finite() || volume < 0.0 {
        return Err(FlowtraderError::malformed(
            line,
            format!("volume must be non-negative, got {}", volume),
        ));
    }

    let side: Side = field(record, idx[3], "side", line)?
        .parse()
        .map_err(|reason: String| FlowtraderError::malformed(line, reason))?;

    Ok(Trade {
        time,
        price,
        volume,
        side,
    })
}

/// Atomically write enriched rows. Undefined imbalance is an empty cell.
pub fn write_enriched(rows: &[EnrichedTrade], destination: &Path) -> Result<(), FlowtraderError> {
    write_csv_atomically(destination, |w| {
        w.write_record(FEATURE_COLUMNS)?;
        for row in rows {
            w.write_record([
                format_timestamp(&row.trade.time),
                row.trade.price.to_string(),
                row.trade.volume.to_string(),
                row.trade.side.to_string(),
                row.buy_volume.to_string(),
                row.sell_volume.to_string(),
                row.volume_delta.to_string(),
                row.cvd.to_string(),
                row.rolling_buy_sum.to_string(),
                row.rolling_sell_sum.to_string(),
                row.order_imbalance.map(|v| v.to_string()).unwrap_or_default(),
            ])?;
        }
        Ok(())
    })?;
    info!(path = %destination.display(), rows = rows.len(), "wrote features");
    Ok(())
}
