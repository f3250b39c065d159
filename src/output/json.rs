//! JSON report for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "generated_at": "2024-05-01T12:00:00+00:00",
//!   "scan": {
//!     "candidates": 12,
//!     "already_recorded": 4,
//!     "recorded": 7,
//!     "failures": [{ "path": "/dl/broken.png", "error": "..." }],
//!     "interrupted": false,
//!     "duration_ms": 5321
//!   },
//!   "resolution": {
//!     "deletable": [{ "duplicate": "/dl/b.png", "original": "/lib/a.png" }],
//!     "removed": [],
//!     "delete_failures": [],
//!     "reference_collisions": [{ "first": "/lib/x.png", "second": "/lib/y.bmp" }],
//!     "aliased": [],
//!     "group_failures": 0,
//!     "interrupted": false
//!   },
//!   "summary": {
//!     "deletable": 1,
//!     "removed": 0,
//!     "bytes_freed": 0,
//!     "delete_failures": 0,
//!     "reference_collisions": 1,
//!     "aliased": 0,
//!     "group_failures": 0,
//!     "exit_code": 0,
//!     "exit_code_name": "MD000"
//!   }
//! }
//! ```
//!
//! `scan` is omitted when the run resolved existing records only;
//! `resolution` is omitted for scan-only runs and `summary` then only
//! carries the exit code.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{OutputError, Report};
use crate::resolver::{Resolution, ResolutionSummary};
use crate::scanner::ScanSummary;

/// A file that could not be scanned.
#[derive(Debug, Clone, Serialize)]
pub struct JsonScanFailure {
    /// File or directory involved
    pub path: String,
    /// Error message
    pub error: String,
}

/// Scan statistics.
#[derive(Debug, Clone, Serialize)]
pub struct JsonScan {
    pub candidates: usize,
    pub already_recorded: usize,
    pub recorded: usize,
    pub failures: Vec<JsonScanFailure>,
    pub interrupted: bool,
    pub duration_ms: u64,
}

impl JsonScan {
    fn from_summary(summary: &ScanSummary) -> Self {
        Self {
            candidates: summary.candidates,
            already_recorded: summary.already_recorded,
            recorded: summary.recorded,
            failures: summary
                .failures
                .iter()
                .map(|f| JsonScanFailure {
                    path: f.path().to_string_lossy().into_owned(),
                    error: f.to_string(),
                })
                .collect(),
            interrupted: summary.interrupted,
            duration_ms: u64::try_from(summary.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Counts plus the exit code.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    #[serde(flatten)]
    pub counts: Option<ResolutionSummary>,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "MD000")
    pub exit_code_name: String,
}

/// Complete JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<JsonScan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<&'a Resolution>,
    pub summary: JsonSummary,
}

impl<'a> JsonOutput<'a> {
    /// Build the document for a run.
    #[must_use]
    pub fn new(report: Report<'a>) -> Self {
        let exit_code = report.exit_code();
        Self {
            generated_at: Utc::now(),
            scan: report.scan.map(JsonScan::from_summary),
            resolution: report.resolution,
            summary: JsonSummary {
                counts: report.resolution.map(Resolution::summary),
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
        }
    }

    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    /// Write JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), OutputError> {
        writer.write_all(self.to_json(pretty)?.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
