//! Scanning: discover candidate files and record their fingerprints.
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: directory traversal filtered by the extension allow-list
//! - [`orchestrator`]: the [`Scanner`] that drives every candidate through
//!   canonicalization, fingerprinting and the record store
//!
//! # Example
//!
//! ```no_run
//! use mediadedupe::canon::ImageCanonicalizer;
//! use mediadedupe::config::SearchPath;
//! use mediadedupe::scanner::{FileTypes, ScanConfig, Scanner};
//! use mediadedupe::store::SqliteStore;
//! use std::path::Path;
//!
//! let store = SqliteStore::open(Path::new("image.db")).unwrap();
//! let canon = ImageCanonicalizer::new(None);
//! let config = ScanConfig::new(
//!     vec![SearchPath::reference("/photos"), SearchPath::new("/downloads")],
//!     FileTypes::new(["png", "jpg"]),
//! );
//!
//! let summary = Scanner::new(&store, &canon, config).scan().unwrap();
//! println!("{} new, {} failed", summary.recorded, summary.failures.len());
//! ```

pub mod orchestrator;
pub mod walker;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::canon::CanonicalizeError;
use crate::fingerprint::FingerprintError;
use crate::store::StoreError;

pub use orchestrator::{ScanConfig, ScanSummary, Scanner};
pub use walker::Walker;

/// Case-insensitive file extension allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTypes {
    extensions: BTreeSet<String>,
}

impl FileTypes {
    /// Build an allow-list. Leading dots are ignored and case does not matter.
    #[must_use]
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_uppercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    /// Whether `path` has an allowed extension.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(&e.to_ascii_uppercase()))
    }

    /// Whether the allow-list is empty (nothing would ever match).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Allowed extensions, upper case and sorted.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

/// Errors that can occur while scanning.
///
/// Only [`ScanError::NotFound`] and [`ScanError::NotADirectory`] on a
/// configured search path stop a scan; everything else is recorded against
/// the file and the scan continues.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while walking.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file could not be canonicalized.
    #[error(transparent)]
    Canonicalize(#[from] CanonicalizeError),

    /// The canonical content could not be fingerprinted.
    #[error("fingerprint failed for {path}: {source}")]
    Fingerprint {
        /// File being fingerprinted
        path: PathBuf,
        /// The underlying error
        #[source]
        source: FingerprintError,
    },

    /// The record store rejected a read or write for this file.
    #[error("record store failed for {path}: {source}")]
    Store {
        /// File whose record was being read or written
        path: PathBuf,
        /// The underlying error
        #[source]
        source: StoreError,
    },
}

impl ScanError {
    /// Path of the file or directory involved.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } | Self::Fingerprint { path, .. } | Self::Store { path, .. } => {
                path
            }
            Self::Canonicalize(e) => e.path(),
        }
    }
}
