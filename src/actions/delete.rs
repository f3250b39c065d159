//! File removal for resolved duplicates.
//!
//! # Overview
//!
//! [`remove_file`] deletes one file either permanently or by moving it to the
//! system trash. It is idempotent: a file that is already gone counts as
//! removed, which lets the resolver drop the store record first and then the
//! file without ever failing on a second run.
//!
//! # Example
//!
//! ```no_run
//! use mediadedupe::actions::delete::{remove_file, DeletionMode, RemoveOutcome};
//! use std::path::Path;
//!
//! match remove_file(Path::new("/downloads/copy.flac"), DeletionMode::Trash) {
//!     Ok(RemoveOutcome::Removed { bytes }) => println!("freed {} bytes", bytes),
//!     Ok(RemoveOutcome::AlreadyAbsent) => println!("already gone"),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How duplicate files are removed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeletionMode {
    /// Unlink the file.
    #[default]
    Permanent,
    /// Move the file to the platform trash.
    Trash,
}

impl DeletionMode {
    /// Lowercase name as used in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::Trash => "trash",
        }
    }
}

impl fmt::Display for DeletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permanent" => Ok(Self::Permanent),
            "trash" => Ok(Self::Trash),
            other => Err(format!(
                "unknown deletion mode '{}' (expected 'permanent' or 'trash')",
                other
            )),
        }
    }
}

/// Error type for deletion operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed { path: PathBuf, message: String },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed { path: PathBuf, message: String },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p)
            | Self::TrashFailed { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }
}

/// What [`remove_file`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The file existed and was removed.
    Removed {
        /// Size of the removed file
        bytes: u64,
    },
    /// There was nothing to remove.
    AlreadyAbsent,
}

impl RemoveOutcome {
    /// Bytes freed, zero when the file was already gone.
    #[must_use]
    pub fn bytes(self) -> u64 {
        match self {
            Self::Removed { bytes } => bytes,
            Self::AlreadyAbsent => 0,
        }
    }
}

/// Remove `path` using `mode`. A missing file is not an error.
///
/// # Errors
///
/// - `PermissionDenied` if the file cannot be inspected
/// - `TrashFailed` or `PermanentDeleteFailed` if removal fails
pub fn remove_file(path: &Path, mode: DeletionMode) -> Result<RemoveOutcome, DeleteError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("Already absent: {}", path.display());
            return Ok(RemoveOutcome::AlreadyAbsent);
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            return Err(DeleteError::PermissionDenied(path.to_path_buf()))
        }
        Err(e) => {
            return Err(DeleteError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    let bytes = metadata.len();

    match mode {
        DeletionMode::Permanent => match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(RemoveOutcome::AlreadyAbsent)
            }
            Err(e) => {
                log::error!("Permanent delete failed for {}: {}", path.display(), e);
                return Err(DeleteError::PermanentDeleteFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
            }
        },
        DeletionMode::Trash => {
            trash::delete(path).map_err(|e| {
                log::error!("Trash operation failed for {}: {}", path.display(), e);
                DeleteError::TrashFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            })?;
        }
    }

    log::debug!("Removed ({}): {} ({} bytes)", mode, path.display(), bytes);
    Ok(RemoveOutcome::Removed { bytes })
}

/// Identity of a file on disk, shared by every path that reaches it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FileKey {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    canonical: PathBuf,
}

impl FileKey {
    #[cfg(unix)]
    fn of(path: &Path) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        let metadata = fs::metadata(path).ok()?;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    // No inode numbers without extra platform crates; the canonical path
    // still catches `..` and symlink aliases.
    #[cfg(not(unix))]
    fn of(path: &Path) -> Option<Self> {
        fs::canonicalize(path).ok().map(|canonical| Self { canonical })
    }
}

/// Whether `a` and `b` reach the same file on disk.
///
/// Symlinks and `..` components are resolved. On Unix two hard links to one
/// inode are the same file. A path that cannot be inspected is never the
/// same as anything.
#[must_use]
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (FileKey::of(a), FileKey::of(b)) {
        (Some(ka), Some(kb)) => ka == kb,
        _ => false,
    }
}
