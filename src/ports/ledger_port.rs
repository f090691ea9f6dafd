//! Ledger persistence port trait.

use std::path::Path;

use crate::domain::error::FlowtraderError;
use crate::domain::position::{MarkToMarket, TradeRecord};

pub trait LedgerPort {
    /// Replace `destination` with exactly `records`. Readers never observe a
    /// partially written file.
    fn write_records(
        &self,
        records: &[TradeRecord],
        destination: &Path,
    ) -> Result<(), FlowtraderError>;

    /// Append `records` to `destination`, creating it if needed. Work done is
    /// proportional to `records.len()`, not to the size of the file.
    fn append_records(
        &self,
        records: &[TradeRecord],
        destination: &Path,
    ) -> Result<(), FlowtraderError>;

    fn read_records(&self, source: &Path) -> Result<Vec<TradeRecord>, FlowtraderError>;

    /// Unrealized snapshots go to their own file, never into the ledger.
    fn write_marks(
        &self,
        marks: &[MarkToMarket],
        destination: &Path,
    ) -> Result<(), FlowtraderError>;
}
