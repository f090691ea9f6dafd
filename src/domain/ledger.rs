//! Append-only ledger of realized trades.

use std::path::Path;

use tracing::debug;

use super::error::FlowtraderError;
use super::position::{MarkToMarket, TradeRecord};
use crate::ports::ledger_port::LedgerPort;

/// Realized trade records in close order, plus the most recent unrealized
/// snapshot of the open position.
///
/// Records can only be appended. `flushed` counts how many have already been
/// handed to a port by [`TradeLedger::flush`].
#[derive(Debug, Clone, Default)]
pub struct TradeLedger {
    records: Vec<TradeRecord>,
    latest_mark: Option<MarkToMarket>,
    flushed: usize,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: TradeRecord) {
        self.records.push(record);
    }

    /// Replace the unrealized snapshot. `None` means nothing is open.
    pub fn set_mark(&mut self, mark: Option<MarkToMarket>) {
        self.latest_mark = mark;
    }

    pub fn latest_mark(&self) -> Option<&MarkToMarket> {
        self.latest_mark.as_ref()
    }

    pub fn snapshot(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records appended since the last flush.
    pub fn pending(&self) -> &[TradeRecord] {
        &self.records[self.flushed..]
    }

    pub fn total_pnl(&self) -> f64 {
        self.records.iter().map(|r| r.pnl).sum()
    }

    /// Atomically write the full ledger to `destination`.
    pub fn persist(
        &self,
        port: &dyn LedgerPort,
        destination: &Path,
    ) -> Result<(), FlowtraderError> {
        port.write_records(&self.records, destination)?;
        debug!(records = self.records.len(), path = %destination.display(), "persisted ledger");
        Ok(())
    }

    /// Append only the pending records to `destination`. Returns how many
    /// were written. On error nothing is marked flushed, so a retry resends
    /// the same batch.
    pub fn flush(
        &mut self,
        port: &dyn LedgerPort,
        destination: &Path,
    ) -> Result<usize, FlowtraderError> {
        let pending = self.pending();
        if pending.is_empty() {
            return Ok(0);
        }
        let count = pending.len();
        port.append_records(pending, destination)?;
        self.flushed = self.records.len();
        debug!(records = count, path = %destination.display(), "flushed ledger");
        Ok(count)
    }
}
