//! Report rendering.
//!
//! A run produces an optional [`ScanSummary`] and a [`Resolution`]. This
//! module renders them as:
//! - text for people, with a "Duplicate References" section
//! - JSON for automation and scripting
//! - CSV with one row per action for spreadsheet import
//!
//! # Example
//!
//! ```no_run
//! use mediadedupe::output::{OutputFormat, Report};
//! use mediadedupe::resolver::Resolution;
//!
//! let resolution = Resolution::default();
//! let report = Report::new(None, Some(&resolution), false);
//! report.write(OutputFormat::Text, &mut std::io::stdout()).unwrap();
//! ```

pub mod csv;
pub mod json;
pub mod text;

use std::io::Write;

use thiserror::Error;

use crate::error::ExitCode;
use crate::resolver::Resolution;
use crate::scanner::ScanSummary;

pub use self::csv::CsvOutput;
pub use self::json::JsonOutput;
pub use self::text::TextOutput;

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON document
    Json,
    /// CSV, one row per action
    Csv,
}

/// Errors raised while writing a report.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Writing failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
}

/// Everything one run has to report.
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    /// Scan statistics, when a scan ran
    pub scan: Option<&'a ScanSummary>,
    /// Resolution results, when resolution ran
    pub resolution: Option<&'a Resolution>,
    /// Whether deletion was enabled
    pub delete_enabled: bool,
}

impl<'a> Report<'a> {
    /// Bundle a run's results.
    #[must_use]
    pub fn new(
        scan: Option<&'a ScanSummary>,
        resolution: Option<&'a Resolution>,
        delete_enabled: bool,
    ) -> Self {
        Self {
            scan,
            resolution,
            delete_enabled,
        }
    }

    /// The exit code this run should end with.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        let interrupted = self.resolution.is_some_and(|r| r.interrupted)
            || self.scan.is_some_and(|s| s.interrupted);
        let failed = self.resolution.is_some_and(Resolution::has_failures)
            || self.scan.is_some_and(ScanSummary::has_failures);

        if interrupted {
            ExitCode::Interrupted
        } else if failed {
            ExitCode::PartialSuccess
        } else {
            match self.resolution {
                Some(r) if !r.found_anything() => ExitCode::NoDuplicates,
                _ => ExitCode::Success,
            }
        }
    }

    /// Render in `format` to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an [`OutputError`] if rendering or writing fails.
    pub fn write<W: Write>(&self, format: OutputFormat, writer: &mut W) -> Result<(), OutputError> {
        match format {
            OutputFormat::Text => TextOutput::new(*self).write_to(writer),
            OutputFormat::Json => JsonOutput::new(*self).write_to(writer, true),
            OutputFormat::Csv => CsvOutput::new(*self).write_to(writer),
        }
    }
}
