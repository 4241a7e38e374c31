/// Persistence port
///
/// A narrow key/value abstraction over durable storage:
/// - `sqlite.rs` - SQLite file in the user data directory (production)
/// - `memory.rs` - in-process map with quota and fault injection (tests)
///
/// Only the index cache and the collection store talk to this port, and
/// each owns its own keys.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

use crate::error::StorageError;

/// The fixed key space of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Cached species index payload
    Index,
    /// Epoch milliseconds of the cached payload
    IndexTimestamp,
    /// The caught/wishlist collection
    Collection,
}

impl StorageKey {
    /// Namespaced key as written to the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Index => "pokemon-collector:index",
            StorageKey::IndexTimestamp => "pokemon-collector:index-timestamp",
            StorageKey::Collection => "pokemon-collector:collection",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable key/value storage.
///
/// Writes are last-writer-wins. `set` fails with
/// [`StorageError::QuotaExceeded`] when the backend is out of space.
pub trait KeyValueStore: Send + Sync {
    /// Read a raw value. `Ok(None)` if the key was never written.
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError>;

    /// Write a raw value, replacing any previous one
    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Removing a missing key is not an error.
    fn remove(&self, key: StorageKey) -> Result<(), StorageError>;
}

/// Read and decode a JSON value
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: StorageKey,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: StorageKey,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STORAGE_PREFIX;

    #[test]
    fn test_keys_share_prefix() {
        for key in [
            StorageKey::Index,
            StorageKey::IndexTimestamp,
            StorageKey::Collection,
        ] {
            assert!(key.as_str().starts_with(STORAGE_PREFIX));
        }
    }

    #[test]
    fn test_read_json_missing_is_none() {
        let store = MemoryStore::new();
        let value: Option<i64> = read_json(&store, StorageKey::IndexTimestamp).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_read_json_garbage_is_serialization_error() {
        let store = MemoryStore::new();
        store.set(StorageKey::IndexTimestamp, "not a number").unwrap();

        let err = read_json::<i64>(&store, StorageKey::IndexTimestamp).unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_write_then_read_json() {
        let store = MemoryStore::new();
        write_json(&store, StorageKey::IndexTimestamp, &42_i64).unwrap();

        assert_eq!(store.get(StorageKey::IndexTimestamp).unwrap().as_deref(), Some("42"));
        assert_eq!(read_json::<i64>(&store, StorageKey::IndexTimestamp).unwrap(), Some(42));
    }
}
