use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{KeyValueStore, StorageKey};
use crate::error::StorageError;

/// SQLite-backed key/value store.
///
/// All values live in a single `kv` table. The connection sits behind a
/// mutex so the store can be shared between the index cache and the
/// collection store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`.
    ///
    /// The parent directory is created if it doesn't exist.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Backend(format!(
                    "failed to create data directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(&db_path)?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
            db_path,
        };
        store.init_schema()?;

        tracing::info!(path = %store.db_path.display(), "Database initialized");
        Ok(store)
    }

    /// Open the database and cap it at `max_pages` pages.
    ///
    /// Once the cap is hit, writes fail with `SQLITE_FULL`, which surfaces
    /// as [`StorageError::QuotaExceeded`].
    pub fn open_with_page_limit(
        db_path: impl AsRef<Path>,
        max_pages: u32,
    ) -> Result<Self, StorageError> {
        let store = Self::open(db_path)?;
        // SQLite answers with the effective limit, which never drops below
        // the pages already in use
        let effective: i64 = store.lock().pragma_update_and_check(
            None,
            "max_page_count",
            max_pages,
            |row| row.get(0),
        )?;
        tracing::debug!(requested = max_pages, effective, "Database page limit set");
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        self.lock().execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        let value = self
            .lock()
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                [key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        let result = self.lock().execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key.as_str(), value, chrono::Utc::now().timestamp()],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = StorageError::from(err);
                tracing::error!(%key, bytes = value.len(), error = %err, "Error writing to storage");
                Err(err)
            }
        }
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        self.lock()
            .execute("DELETE FROM kv WHERE key = ?1", [key.as_str()])?;
        Ok(())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}
