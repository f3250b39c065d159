//! Error umbrella and process exit codes.

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::scanner::ScanError;
use crate::store::StoreError;

/// Failures that end a run early.
///
/// Per-file and per-group problems never appear here; they are collected in
/// the scan summary and the resolution instead. Only configuration, the store
/// being unusable and user interruption stop the process.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The record store could not be opened or read.
    #[error("record store unavailable: {0}")]
    Store(#[from] StoreError),

    /// A search path is unusable.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The audio decoder is not installed or not runnable.
    #[error("decoder '{0}' is not available; install ffmpeg or set `decoder`")]
    DecoderUnavailable(String),

    /// The user pressed Ctrl+C.
    #[error("interrupted by user")]
    Interrupted,
}

/// Process exit codes.
///
/// - 0: completed and duplicates (or collisions) were found
/// - 1: fatal error
/// - 2: completed, nothing found
/// - 3: completed, but some files failed to scan or delete
/// - 130: interrupted (128 + SIGINT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed with findings.
    Success = 0,
    /// A fatal error occurred.
    GeneralError = 1,
    /// Completed, no duplicates.
    NoDuplicates = 2,
    /// Completed with per-file failures.
    PartialSuccess = 3,
    /// Interrupted by Ctrl+C.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit status.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "MD000",
            Self::GeneralError => "MD001",
            Self::NoDuplicates => "MD002",
            Self::PartialSuccess => "MD003",
            Self::Interrupted => "MD130",
        }
    }

    /// Exit code for an error that escaped `run_app`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<EngineError>() {
            Some(EngineError::Interrupted) => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Error report printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Machine-readable code, e.g. "MD001"
    pub code: String,
    /// Numeric exit status
    pub exit_code: i32,
    /// Error message including causes
    pub message: String,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Build the report for `err`.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::GeneralError.as_i32(), 1);
        assert_eq!(ExitCode::NoDuplicates.as_i32(), 2);
        assert_eq!(ExitCode::PartialSuccess.as_i32(), 3);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
        assert_eq!(ExitCode::PartialSuccess.code_prefix(), "MD003");
    }

    #[test]
    fn test_for_error_detects_interruption() {
        let err = anyhow::Error::new(EngineError::Interrupted);
        assert_eq!(ExitCode::for_error(&err), ExitCode::Interrupted);

        let err = anyhow::Error::new(EngineError::Config(ConfigError::NoSearchPaths))
            .context("loading configuration");
        assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    }

    #[test]
    fn test_structured_error_json() {
        let err = anyhow::Error::new(EngineError::Interrupted);
        let structured = StructuredError::new(&err, ExitCode::Interrupted);
        let json = serde_json::to_value(&structured).unwrap();
        assert_eq!(json["code"], "MD130");
        assert_eq!(json["exit_code"], 130);
        assert_eq!(json["interrupted"], true);
        assert_eq!(json["message"], "interrupted by user");
    }
}
