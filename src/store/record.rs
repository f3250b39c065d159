//! Media record definition.

use std::path::PathBuf;

use crate::fingerprint::Fingerprint;

/// One scanned file and the fingerprint of its canonical content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    /// Store-internal identity; distinguishes records sharing a fingerprint.
    pub id: i64,
    /// Absolute path of the file. Unique across the store.
    pub path: PathBuf,
    /// Digest of the canonical content.
    pub fingerprint: Fingerprint,
    /// Whether the file lives in a reference directory.
    pub is_reference: bool,
}

impl MediaRecord {
    /// Create a record.
    #[must_use]
    pub fn new(id: i64, path: PathBuf, fingerprint: Fingerprint, is_reference: bool) -> Self {
        Self {
            id,
            path,
            fingerprint,
            is_reference,
        }
    }
}
