//! CSV ledger persistence.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tracing::info;

use super::csv_support::{column_indices, field, line_of, parse_field, write_csv_atomically};
use crate::domain::error::FlowtraderError;
use crate::domain::position::{MarkToMarket, TradeRecord, TradeSide};
use crate::domain::trade::{format_timestamp, parse_timestamp};
use crate::ports::ledger_port::LedgerPort;

pub const LEDGER_COLUMNS: [&str; 6] = [
    "entry_time",
    "entry_price",
    "exit_time",
    "exit_price",
    "side",
    "pnl",
];

pub const MARK_COLUMNS: [&str; 6] = [
    "time",
    "side",
    "entry_time",
    "entry_price",
    "last_price",
    "unrealized_pnl",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvLedgerAdapter;

impl CsvLedgerAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn record_fields(r: &TradeRecord) -> [String; 6] {
    [
        format_timestamp(&r.entry_time),
        r.entry_price.to_string(),
        format_timestamp(&r.exit_time),
        r.exit_price.to_string(),
        r.side.to_string(),
        r.pnl.to_string(),
    ]
}

/// Run `write` against `file`, truncating back to the original length if it
/// fails so a partial batch never stays in the file.
fn append_or_rollback<F>(file: &File, write: F) -> io::Result<()>
where
    F: FnOnce(&File) -> io::Result<()>,
{
    let len = file.metadata()?.len();
    if let Err(e) = write(file) {
        file.set_len(len)?;
        return Err(e);
    }
    Ok(())
}

impl LedgerPort for CsvLedgerAdapter {
    fn write_records(
        &self,
        records: &[TradeRecord],
        destination: &Path,
    ) -> Result<(), FlowtraderError> {
        write_csv_atomically(destination, |w| {
            w.write_record(LEDGER_COLUMNS)?;
            for r in records {
                w.write_record(record_fields(r))?;
            }
            Ok(())
        })?;
        info!(path = %destination.display(), records = records.len(), "wrote trade ledger");
        Ok(())
    }

    fn append_records(
        &self,
        records: &[TradeRecord],
        destination: &Path,
    ) -> Result<(), FlowtraderError> {
        let has_content = fs::metadata(destination)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !has_content {
            return self.write_records(records, destination);
        }

        let mut buf = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for r in records {
            buf.write_record(record_fields(r))
                .map_err(|e| FlowtraderError::persist(destination, e))?;
        }
        let bytes = buf
            .into_inner()
            .map_err(|e| FlowtraderError::persist(destination, e.error()))?;

        let file = OpenOptions::new()
            .append(true)
            .open(destination)
            .map_err(|e| FlowtraderError::persist(destination, e))?;
        append_or_rollback(&file, |mut f| {
            f.write_all(&bytes)?;
            f.sync_data()
        })
        .map_err(|e| FlowtraderError::persist(destination, e))?;
        Ok(())
    }

    fn read_records(&self, source: &Path) -> Result<Vec<TradeRecord>, FlowtraderError> {
        let file = File::open(source).map_err(|e| FlowtraderError::Input {
            path: source.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
        let headers = rdr
            .headers()
            .map_err(|e| FlowtraderError::malformed(1, format!("unreadable header: {}", e)))?
            .clone();
        let idx = column_indices(&headers, &LEDGER_COLUMNS)?;

        let mut records = Vec::new();
        for (n, result) in rdr.records().enumerate() {
            let fallback_line = n as u64 + 2;
            let record = result
                .map_err(|e| FlowtraderError::malformed(fallback_line, e.to_string()))?;
            let line = line_of(&record, fallback_line);
            let time_at = |i: usize, name: &str| -> Result<_, FlowtraderError> {
                let raw = field(&record, idx[i], name, line)?;
                parse_timestamp(raw).ok_or_else(|| {
                    FlowtraderError::malformed(line, format!("invalid {} value '{}'", name, raw))
                })
            };
            let side: TradeSide = field(&record, idx[4], "side", line)?
                .parse()
                .map_err(|reason: String| FlowtraderError::malformed(line, reason))?;
            records.push(TradeRecord {
                entry_time: time_at(0, "entry_time")?,
                entry_price: parse_field(&record, idx[1], "entry_price", line)?,
                exit_time: time_at(2, "exit_time")?,
                exit_price: parse_field(&record, idx[3], "exit_price", line)?,
                side,
                pnl: parse_field(&record, idx[5], "pnl", line)?,
            });
        }
        Ok(records)
    }

    fn write_marks(
        &self,
        marks: &[MarkToMarket],
        destination: &Path,
    ) -> Result<(), FlowtraderError> {
        write_csv_atomically(destination, |w| {
            w.write_record(MARK_COLUMNS)?;
            for m in marks {
                w.write_record([
                    format_timestamp(&m.time),
                    m.side.to_string(),
                    format_timestamp(&m.entry_time),
                    m.entry_price.to_string(),
                    m.last_price.to_string(),
                    m.unrealized_pnl.to_string(),
                ])?;
            }
            Ok(())
        })?;
        info!(path = %destination.display(), marks = marks.len(), "wrote mark-to-market snapshots");
        Ok(())
    }
}
