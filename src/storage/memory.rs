//! In-memory key/value store
//!
//! Clone-friendly via Arc: every clone sees the same map, so a test can
//! keep a handle to inspect what a component persisted. Supports a byte
//! quota and forced write failures for exercising rollback paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use super::{KeyValueStore, StorageKey};
use crate::error::StorageError;

#[derive(Default)]
struct Inner {
    values: RwLock<HashMap<StorageKey, String>>,
    /// Total bytes allowed across all values (0 = unlimited)
    quota_bytes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

/// HashMap-backed store for tests and development
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create a new empty store with no quota
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes pushing the total above `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        let store = Self::new();
        store.inner.quota_bytes.store(bytes, Ordering::SeqCst);
        store
    }

    /// Make every subsequent read fail with a backend error
    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write or remove fail with a backend error
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set` calls so far
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Peek at a raw value, bypassing fault injection
    pub fn raw(&self, key: StorageKey) -> Option<String> {
        self.read_map().get(&key).cloned()
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<StorageKey, String>> {
        self.inner
            .values
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<StorageKey, String>> {
        self.inner
            .values
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StorageError> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("simulated read failure on {}", key)));
        }
        Ok(self.read_map().get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("simulated write failure on {}", key)));
        }

        let mut values = self.write_map();
        let quota = self.inner.quota_bytes.load(Ordering::SeqCst);
        if quota > 0 {
            let others: usize = values
                .iter()
                .filter(|(k, _)| **k != key)
                .map(|(_, v)| v.len())
                .sum();
            if others + value.len() > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }

        values.insert(key, value.to_string());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("simulated remove failure on {}", key)));
        }
        self.write_map().remove(&key);
        Ok(())
    }
}
