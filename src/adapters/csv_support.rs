//! Shared CSV helpers: header lookup, field parsing and atomic writes.

use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use tempfile::NamedTempFile;

use crate::domain::error::FlowtraderError;

/// Resolve each required column name to its index in `headers`.
///
/// Matching ignores case and surrounding whitespace. The first missing column
/// is reported.
pub fn column_indices(
    headers: &csv::StringRecord,
    required: &[&str],
) -> Result<Vec<usize>, FlowtraderError> {
    required
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| FlowtraderError::MissingColumn {
                    column: name.to_string(),
                })
        })
        .collect()
}

/// 1-based file line of a record, falling back to `fallback`.
pub fn line_of(record: &csv::StringRecord, fallback: u64) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(fallback)
}

pub fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<&'r str, FlowtraderError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| FlowtraderError::malformed(line, format!("missing {} value", name)))
}

pub fn parse_field<T: FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<T, FlowtraderError> {
    let raw = field(record, index, name, line)?;
    raw.parse::<T>()
        .map_err(|_| FlowtraderError::malformed(line, format!("invalid {} value '{}'", name, raw)))
}

/// Write a CSV file through a temporary sibling and rename it over
/// `destination` once complete.
pub fn write_csv_atomically<F>(destination: &Path, fill: F) -> Result<(), FlowtraderError>
where
    F: FnOnce(&mut csv::Writer<&mut File>) -> Result<(), csv::Error>,
{
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|e| FlowtraderError::persist(destination, e))?;
    {
        let mut wtr = csv::Writer::from_writer(tmp.as_file_mut());
        fill(&mut wtr).map_err(|e| FlowtraderError::persist(destination, e))?;
        wtr.flush()
            .map_err(|e| FlowtraderError::persist(destination, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| FlowtraderError::persist(destination, e))?;
    tmp.persist(destination)
        .map_err(|e| FlowtraderError::persist(destination, e.error))?;
    Ok(())
}
