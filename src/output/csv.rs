//! CSV report, one row per action.
//!
//! # Columns
//!
//! - `action`: `scan_failed`, `deletable`, `removed`, `delete_failed`,
//!   `aliased` or `reference_collision`
//! - `path`: the file acted on (or the first reference file of a collision)
//! - `original`: the reference file it duplicates, empty for `scan_failed`
//! - `bytes`: bytes freed, only for `removed`

use std::io;
use std::path::Path;

use serde::Serialize;

use super::{OutputError, Report};

#[derive(Debug, Serialize)]
struct CsvRow {
    action: &'static str,
    path: String,
    original: String,
    bytes: Option<u64>,
}

impl CsvRow {
    fn new(action: &'static str, path: &Path, original: &Path, bytes: Option<u64>) -> Self {
        Self {
            action,
            path: path.to_string_lossy().into_owned(),
            original: original.to_string_lossy().into_owned(),
            bytes,
        }
    }

    fn scan_failure(path: &Path) -> Self {
        Self::new("scan_failed", path, Path::new(""), None)
    }
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    report: Report<'a>,
}

impl<'a> CsvOutput<'a> {
    /// Create a CSV formatter.
    #[must_use]
    pub fn new(report: Report<'a>) -> Self {
        Self { report }
    }

    fn rows(&self) -> Vec<CsvRow> {
        let mut rows: Vec<CsvRow> = self
            .report
            .scan
            .map(|s| s.failed_paths().map(CsvRow::scan_failure).collect())
            .unwrap_or_default();

        let Some(r) = self.report.resolution else {
            return rows;
        };
        let actions = r
            .deletable
            .iter()
            .map(|p| CsvRow::new("deletable", &p.duplicate, &p.original, None))
            .chain(
                r.removed
                    .iter()
                    .map(|m| CsvRow::new("removed", &m.path, &m.original, Some(m.bytes))),
            )
            .chain(
                r.delete_failures
                    .iter()
                    .map(|f| CsvRow::new("delete_failed", &f.path, &f.original, None)),
            )
            .chain(
                r.aliased
                    .iter()
                    .map(|p| CsvRow::new("aliased", &p.duplicate, &p.original, None)),
            )
            .chain(
                r.reference_collisions
                    .iter()
                    .map(|c| CsvRow::new("reference_collision", &c.first, &c.second, None)),
            );
        rows.extend(actions);
        rows
    }

    /// Write the CSV, header included.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), OutputError> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record(["action", "path", "original", "bytes"])?;
        for row in self.rows() {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Render to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_csv_string(&self) -> Result<String, OutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
