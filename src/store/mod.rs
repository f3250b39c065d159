//! Persistent record store for media fingerprints.
//!
//! # Architecture
//!
//! * [`record`]: the [`MediaRecord`] data type
//! * [`sqlite`]: [`SqliteStore`], the SQLite-backed implementation
//!
//! The scanner and resolver only talk to the narrow [`RecordStore`] trait, so
//! neither depends on how records are persisted.
//!
//! # Invariants
//!
//! * exactly one record per path; re-upserting a path replaces it
//! * a record always carries a complete fingerprint (failed scans write nothing)
//! * `is_reference` is fixed when the record is created

pub mod record;
pub mod sqlite;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::fingerprint::Fingerprint;

pub use record::MediaRecord;
pub use sqlite::SqliteStore;

/// Records fetched per page by [`RecordIter`].
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Errors raised by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database rejected an operation.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store location could not be prepared.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Paths are stored as UTF-8 text.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// The database was written by a newer version of this tool.
    #[error("unsupported schema version {found} (expected at most {supported})")]
    SchemaVersion {
        /// Version found in the database
        found: i64,
        /// Newest version this build understands
        supported: i64,
    },

    /// A thread panicked while holding the connection.
    #[error("record store lock poisoned")]
    Poisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The operations the scanner and resolver need from persistence.
///
/// Implementations must be safe to share across worker threads; each call is
/// atomic on its own.
pub trait RecordStore: Send + Sync {
    /// Insert a record for `path`, replacing any existing one (last writer wins).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the write is rejected.
    fn upsert(&self, path: &Path, fingerprint: &Fingerprint, is_reference: bool)
        -> StoreResult<()>;

    /// Whether a record exists for `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the lookup fails.
    fn exists(&self, path: &Path) -> StoreResult<bool>;

    /// All records with `fingerprint` and the given reference flag, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the lookup fails.
    fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        is_reference: bool,
    ) -> StoreResult<Vec<MediaRecord>>;

    /// Up to `limit` records with the given reference flag and an id greater
    /// than `after_id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the lookup fails.
    fn page_with(
        &self,
        is_reference: bool,
        after_id: i64,
        limit: usize,
    ) -> StoreResult<Vec<MediaRecord>>;

    /// Remove the record for `path`. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the delete is rejected.
    fn delete(&self, path: &Path) -> StoreResult<bool>;

    /// Total number of records.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the count fails.
    fn count(&self) -> StoreResult<u64>;

    /// Lazily iterate every record with the given reference flag.
    fn iter_with(&self, is_reference: bool) -> RecordIter<'_, Self>
    where
        Self: Sized,
    {
        RecordIter::new(self, is_reference, DEFAULT_PAGE_SIZE)
    }
}

/// Lazy, paged iteration over records with one reference flag.
///
/// Pages are keyed on the record id, so records removed while iterating are
/// simply not returned again and memory stays bounded by the page size.
/// After an error the iterator yields that error once and then ends.
pub struct RecordIter<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    is_reference: bool,
    page_size: usize,
    last_id: i64,
    buffer: VecDeque<MediaRecord>,
    done: bool,
}

impl<'a, S: RecordStore + ?Sized> RecordIter<'a, S> {
    /// Create an iterator fetching `page_size` records at a time.
    #[must_use]
    pub fn new(store: &'a S, is_reference: bool, page_size: usize) -> Self {
        Self {
            store,
            is_reference,
            page_size: page_size.max(1),
            last_id: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn fill(&mut self) -> StoreResult<()> {
        let page = self
            .store
            .page_with(self.is_reference, self.last_id, self.page_size)?;
        if page.len() < self.page_size {
            self.done = true;
        }
        if let Some(last) = page.last() {
            self.last_id = last.id;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<S: RecordStore + ?Sized> Iterator for RecordIter<'_, S> {
    type Item = StoreResult<MediaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
