//! SQLite-backed record store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{MediaRecord, RecordStore, StoreError, StoreResult};
use crate::fingerprint::Fingerprint;

/// Schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS media_records (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    path         TEXT    NOT NULL UNIQUE,
    fingerprint  TEXT    NOT NULL CHECK (length(fingerprint) = 64),
    is_reference INTEGER NOT NULL CHECK (is_reference IN (0, 1))
);
CREATE INDEX IF NOT EXISTS idx_media_records_fingerprint
    ON media_records (fingerprint, is_reference);
";

const SELECT_COLUMNS: &str = "SELECT id, path, fingerprint, is_reference FROM media_records";

/// Record store persisted in a single SQLite database file.
///
/// The connection sits behind a mutex so one store can be shared by the whole
/// worker pool; every public method runs one statement under the lock.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("location", &self.location)
            .finish()
    }
}

impl SqliteStore {
    /// Open or create the store at `path`.
    ///
    /// Creates the parent directory if needed, configures the connection and
    /// migrates the schema. A store that opens successfully is ready for
    /// writes, so callers can use this as the startup connectivity check.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if SQLite cannot allocate the database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, location: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        migrate(&conn)?;
        log::debug!(
            "Record store ready at {}",
            location
                .as_ref()
                .map_or_else(|| ":memory:".to_string(), |p| p.display().to_string())
        );
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Database file backing this store, `None` for in-memory stores.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Remove every record.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the delete is rejected.
    pub fn clear(&self) -> StoreResult<u64> {
        let removed = self.lock()?.execute("DELETE FROM media_records", [])?;
        log::info!("Cleared {} record(s)", removed);
        Ok(removed as u64)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn migrate(conn: &Connection) -> StoreResult<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(StoreError::SchemaVersion {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }

    conn.execute_batch(SCHEMA)?;
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        log::debug!("Schema migrated from version {} to {}", version, SCHEMA_VERSION);
    }
    Ok(())
}

fn path_text(path: &Path) -> StoreResult<&str> {
    path.to_str()
        .ok_or_else(|| StoreError::NonUtf8Path(path.to_path_buf()))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    let hex: String = row.get(2)?;
    let fingerprint = Fingerprint::from_hex(&hex)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(MediaRecord {
        id: row.get(0)?,
        path: PathBuf::from(row.get::<_, String>(1)?),
        fingerprint,
        is_reference: row.get(3)?,
    })
}

impl RecordStore for SqliteStore {
    fn upsert(
        &self,
        path: &Path,
        fingerprint: &Fingerprint,
        is_reference: bool,
    ) -> StoreResult<()> {
        let path = path_text(path)?;
        self.lock()?.execute(
            "INSERT INTO media_records (path, fingerprint, is_reference)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                is_reference = excluded.is_reference",
            params![path, fingerprint.to_hex(), is_reference],
        )?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> StoreResult<bool> {
        let path = path_text(path)?;
        let found = self
            .lock()?
            .query_row(
                "SELECT 1 FROM media_records WHERE path = ?1",
                params![path],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        is_reference: bool,
    ) -> StoreResult<Vec<MediaRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "{} WHERE fingerprint = ?1 AND is_reference = ?2 ORDER BY id",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![fingerprint.to_hex(), is_reference], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn page_with(
        &self,
        is_reference: bool,
        after_id: i64,
        limit: usize,
    ) -> StoreResult<Vec<MediaRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "{} WHERE is_reference = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
            SELECT_COLUMNS
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![is_reference, after_id, limit], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn delete(&self, path: &Path) -> StoreResult<bool> {
        let path = path_text(path)?;
        let removed = self
            .lock()?
            .execute("DELETE FROM media_records WHERE path = ?1", params![path])?;
        Ok(removed > 0)
    }

    fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM media_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
