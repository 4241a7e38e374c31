use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::{IndexProvider, TypeTags};
use crate::clock::Clock;
use crate::config::{INDEX_RETRY_DELAY, INDEX_TTL};
use crate::error::FetchError;
use crate::state::SpeciesRef;
use crate::storage::{read_json, write_json, KeyValueStore, StorageKey};

/// Cache freshness and retry timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCacheConfig {
    /// How long a cached index is served without a network call
    pub ttl: Duration,
    /// Pause before the single internal retry
    pub retry_delay: Duration,
}

impl Default for IndexCacheConfig {
    fn default() -> Self {
        Self {
            ttl: INDEX_TTL,
            retry_delay: INDEX_RETRY_DELAY,
        }
    }
}

/// Lifecycle of the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Where the current index came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Cache,
    Network,
}

/// Observable state of the index cache
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub status: LoadStatus,
    /// Empty until the first successful load
    pub species: Arc<Vec<SpeciesRef>>,
    pub error: Option<FetchError>,
    pub source: Option<IndexSource>,
}

/// Cached record as persisted.
///
/// `types` is optional here only so that entries written before type tags
/// existed can be told apart from entries with no tags.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedSpecies {
    id: u32,
    name: String,
    image_url: String,
    #[serde(default)]
    types: Option<Vec<String>>,
}

/// Fetches, caches and serves the species index.
///
/// Every load sequence is tagged with an attempt number. When a `retry()`
/// starts while an older sequence is still in flight, the older one's
/// result is dropped: it neither touches the cache nor the snapshot.
pub struct IndexCache {
    storage: Arc<dyn KeyValueStore>,
    provider: Arc<dyn IndexProvider>,
    clock: Arc<dyn Clock>,
    config: IndexCacheConfig,
    attempt: AtomicU64,
    state: watch::Sender<IndexSnapshot>,
}

impl IndexCache {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        provider: Arc<dyn IndexProvider>,
        clock: Arc<dyn Clock>,
        config: IndexCacheConfig,
    ) -> Self {
        let (state, _) = watch::channel(IndexSnapshot::default());
        Self {
            storage,
            provider,
            clock,
            config,
            attempt: AtomicU64::new(0),
            state,
        }
    }

    /// Load the index.
    ///
    /// - Idle: runs the load sequence (cache first, then network)
    /// - Loading: waits for the running sequence and returns its outcome
    /// - Ready: returns the current index
    /// - Failed: returns the stored error; use [`retry`](Self::retry)
    ///
    /// If the running sequence is cancelled, a waiting caller starts a new one.
    pub async fn load(&self) -> Result<Arc<Vec<SpeciesRef>>, FetchError> {
        loop {
            let mut attempt = None;
            self.state.send_if_modified(|snapshot| {
                if snapshot.status != LoadStatus::Idle {
                    return false;
                }
                attempt = Some(self.next_attempt());
                snapshot.status = LoadStatus::Loading;
                true
            });

            if let Some(attempt) = attempt {
                return self.run(attempt).await;
            }
            if let Some(outcome) = self.settled().await {
                return outcome;
            }
        }
    }

    /// Restart the full load sequence, whatever the current state.
    ///
    /// Any sequence still in flight is superseded.
    pub async fn retry(&self) -> Result<Arc<Vec<SpeciesRef>>, FetchError> {
        let attempt = self.next_attempt();
        self.state.send_modify(|snapshot| {
            snapshot.status = LoadStatus::Loading;
            snapshot.error = None;
        });
        tracing::info!(attempt, "Retrying index load");
        self.run(attempt).await
    }

    /// A copy of the current state
    pub fn snapshot(&self) -> IndexSnapshot {
        self.state.borrow().clone()
    }

    /// Receive a new snapshot after every transition
    pub fn subscribe(&self) -> watch::Receiver<IndexSnapshot> {
        self.state.subscribe()
    }

    fn next_attempt(&self) -> u64 {
        self.attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.attempt.load(Ordering::SeqCst) == attempt
    }

    /// Wait until no sequence is running and report the settled state.
    ///
    /// `None` when the sequence was abandoned and the state is Idle again.
    async fn settled(&self) -> Option<Result<Arc<Vec<SpeciesRef>>, FetchError>> {
        let mut rx = self.state.subscribe();
        let snapshot = match rx.wait_for(|s| s.status != LoadStatus::Loading).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => return Some(Err(FetchError::Superseded)),
        };

        match snapshot.status {
            LoadStatus::Idle => None,
            LoadStatus::Failed => Some(Err(snapshot.error.unwrap_or(FetchError::Superseded))),
            _ => Some(Ok(snapshot.species)),
        }
    }

    async fn run(&self, attempt: u64) -> Result<Arc<Vec<SpeciesRef>>, FetchError> {
        let mut guard = AttemptGuard {
            cache: self,
            attempt,
            armed: true,
        };
        let outcome = self.acquire(attempt).await;
        guard.armed = false;

        if !self.is_current(attempt) {
            tracing::debug!(attempt, "Discarding result of superseded index load");
            return Err(FetchError::Superseded);
        }

        match outcome {
            Ok((species, source)) => {
                let species = Arc::new(species);
                tracing::info!(attempt, count = species.len(), ?source, "Index ready");
                self.state.send_replace(IndexSnapshot {
                    status: LoadStatus::Ready,
                    species: species.clone(),
                    error: None,
                    source: Some(source),
                });
                Ok(species)
            }
            Err(err) => {
                tracing::error!(attempt, error = %err, "Index load failed");
                self.state.send_modify(|snapshot| {
                    snapshot.status = LoadStatus::Failed;
                    snapshot.error = Some(err.clone());
                });
                Err(err)
            }
        }
    }

    /// Cache hit, or network fetch with one retry
    async fn acquire(&self, attempt: u64) -> Result<(Vec<SpeciesRef>, IndexSource), FetchError> {
        if let Some(species) = self.read_cache() {
            return Ok((species, IndexSource::Cache));
        }

        let species = match self.fetch_index().await {
            Ok(species) => species,
            Err(err) => {
                tracing::warn!(
                    attempt,
                    error = %err,
                    delay_ms = self.config.retry_delay.as_millis() as u64,
                    "Index fetch failed; retrying once"
                );
                tokio::time::sleep(self.config.retry_delay).await;
                if !self.is_current(attempt) {
                    return Err(FetchError::Superseded);
                }
                self.fetch_index().await?
            }
        };

        if self.is_current(attempt) {
            self.write_cache(&species);
        }
        Ok((species, IndexSource::Network))
    }

    /// Fetch the list and the type tags concurrently and merge them.
    ///
    /// A failed tag fetch leaves every record with empty tags.
    async fn fetch_index(&self) -> Result<Vec<SpeciesRef>, FetchError> {
        let (species, tags) = tokio::join!(
            self.provider.fetch_species(),
            self.provider.fetch_type_tags()
        );

        let mut species = species?;
        let tags: TypeTags = tags.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Type tags unavailable; continuing without them");
            TypeTags::new()
        });

        for record in &mut species {
            if let Some(types) = tags.get(&record.name) {
                record.types = types.clone();
            }
        }
        Ok(species)
    }

    /// The cached payload, if fresh and in the current shape
    fn read_cache(&self) -> Option<Vec<SpeciesRef>> {
        let storage = &*self.storage;
        let fetched_at = match read_json::<i64>(storage, StorageKey::IndexTimestamp) {
            Ok(Some(ts)) => ts,
            Ok(None) => {
                tracing::debug!("No cached index");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Cached index timestamp unreadable");
                return None;
            }
        };

        let age_ms = self.clock.now_ms().saturating_sub(fetched_at);
        let ttl_ms = i64::try_from(self.config.ttl.as_millis()).unwrap_or(i64::MAX);
        if age_ms >= ttl_ms {
            tracing::info!(age_ms, ttl_ms, "Cached index expired");
            return None;
        }

        let cached = match read_json::<Vec<CachedSpecies>>(storage, StorageKey::Index) {
            Ok(Some(cached)) => cached,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "Cached index unreadable");
                return None;
            }
        };

        // Entries from before type tags were cached count as a miss
        if cached.is_empty() || cached.iter().any(|c| c.types.is_none()) {
            tracing::info!(count = cached.len(), "Cached index has an outdated shape; refreshing");
            return None;
        }

        tracing::info!(count = cached.len(), age_ms, "Using cached index");
        Some(
            cached
                .into_iter()
                .map(|c| SpeciesRef {
                    id: c.id,
                    name: c.name,
                    image_url: c.image_url,
                    types: c.types.unwrap_or_default(),
                })
                .collect(),
        )
    }

    /// Replace the cache entry wholesale. Failures are logged, not fatal.
    fn write_cache(&self, species: &[SpeciesRef]) {
        let storage = &*self.storage;
        let written = write_json(storage, StorageKey::Index, species)
            .and_then(|_| write_json(storage, StorageKey::IndexTimestamp, &self.clock.now_ms()));

        if let Err(err) = written {
            tracing::warn!(error = %err, "Could not cache index");
            // Never leave a payload paired with a stale timestamp
            for key in [StorageKey::IndexTimestamp, StorageKey::Index] {
                if let Err(err) = storage.remove(key) {
                    tracing::warn!(%key, error = %err, "Could not clear partial index cache");
                }
            }
        }
    }
}

/// Puts a cancelled sequence back to Idle.
///
/// Without it, dropping a `load()` future mid-fetch would leave the status
/// at Loading with nothing left to finish it.
struct AttemptGuard<'a> {
    cache: &'a IndexCache,
    attempt: u64,
    armed: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed || !self.cache.is_current(self.attempt) {
            return;
        }
        let reset = self.cache.state.send_if_modified(|snapshot| {
            if snapshot.status != LoadStatus::Loading {
                return false;
            }
            snapshot.status = LoadStatus::Idle;
            true
        });
        if reset {
            tracing::warn!(attempt = self.attempt, "Index load cancelled; back to idle");
        }
    }
}
