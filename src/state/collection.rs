use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::data::{Collection, Membership, SpeciesId};
use crate::error::CollectionError;
use crate::storage::{read_json, write_json, KeyValueStore, StorageKey};

/// A single mutation of the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOp {
    ToggleCaught(SpeciesId),
    ToggleWishlist(SpeciesId),
}

impl CollectionOp {
    /// The id the operation targets
    pub fn id(&self) -> SpeciesId {
        match self {
            CollectionOp::ToggleCaught(id) | CollectionOp::ToggleWishlist(id) => *id,
        }
    }
}

impl Collection {
    /// Compute the collection that results from `op`.
    ///
    /// Returns `None` when the operation is a no-op (wishlisting a caught
    /// species). The result always satisfies the disjointness invariant
    /// when `self` does.
    pub fn apply(&self, op: CollectionOp) -> Option<Collection> {
        match op {
            CollectionOp::ToggleCaught(id) => {
                let mut next = self.clone();
                if !next.caught.remove(&id) {
                    next.caught.insert(id);
                    next.wishlist.remove(&id);
                }
                Some(next)
            }
            CollectionOp::ToggleWishlist(id) => {
                // Cannot wishlist something already caught
                if self.caught.contains(&id) {
                    return None;
                }
                let mut next = self.clone();
                if !next.wishlist.remove(&id) {
                    next.wishlist.insert(id);
                }
                Some(next)
            }
        }
    }
}

/// Outcome of a toggle: membership before and after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    pub id: SpeciesId,
    pub before: Membership,
    pub after: Membership,
}

impl Toggle {
    /// Whether the call left the collection unchanged
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// Observable state of the collection store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSnapshot {
    pub collection: Collection,
    /// Last load or save failure, cleared by the next successful save
    pub error: Option<CollectionError>,
}

/// Owns the caught/wishlist sets and their persisted copy.
///
/// Every mutation is one read-modify-write-persist step under a lock:
/// the next collection is computed, written to storage, and only then
/// committed to memory. A failed write leaves memory untouched.
pub struct CollectionStore {
    storage: Arc<dyn KeyValueStore>,
    current: Mutex<Collection>,
    snapshot: watch::Sender<CollectionSnapshot>,
}

impl CollectionStore {
    /// Load the persisted collection.
    ///
    /// A missing value starts empty. An unreadable one also starts empty but
    /// records [`CollectionError::LoadFailed`]; the store stays writable.
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Self {
        let (collection, error) = match read_json::<Collection>(&*storage, StorageKey::Collection) {
            Ok(Some(mut collection)) => {
                let repaired = collection.normalize();
                if !repaired.is_empty() {
                    tracing::warn!(?repaired, "Persisted collection had ids in both sets; kept them as caught");
                }
                tracing::info!(
                    caught = collection.caught.len(),
                    wishlist = collection.wishlist.len(),
                    "Collection loaded"
                );
                (collection, None)
            }
            Ok(None) => (Collection::default(), None),
            Err(err) => {
                tracing::error!(error = %err, "Failed to load collection");
                (Collection::default(), Some(CollectionError::LoadFailed(err.to_string())))
            }
        };

        let (snapshot, _) = watch::channel(CollectionSnapshot {
            collection: collection.clone(),
            error,
        });

        Self {
            storage,
            current: Mutex::new(collection),
            snapshot,
        }
    }

    /// Mark `id` caught, or release it if already caught.
    ///
    /// Catching removes the id from the wishlist in the same update.
    pub fn toggle_caught(&self, id: SpeciesId) -> Result<Toggle, CollectionError> {
        self.transact(CollectionOp::ToggleCaught(id))
    }

    /// Add `id` to the wishlist, or remove it. No-op if `id` is caught.
    pub fn toggle_wishlist(&self, id: SpeciesId) -> Result<Toggle, CollectionError> {
        self.transact(CollectionOp::ToggleWishlist(id))
    }

    /// Replace the whole collection.
    ///
    /// Overlapping ids are kept as caught.
    pub fn replace(&self, mut collection: Collection) -> Result<(), CollectionError> {
        collection.normalize();
        let mut current = self.lock();
        self.persist(&current, &collection)?;
        *current = collection;
        self.publish(&current, None);
        Ok(())
    }

    /// Current membership of one id
    pub fn membership(&self, id: SpeciesId) -> Membership {
        self.lock().membership(id)
    }

    /// A copy of the current state
    pub fn snapshot(&self) -> CollectionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receive a new snapshot after every change
    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot> {
        self.snapshot.subscribe()
    }

    fn transact(&self, op: CollectionOp) -> Result<Toggle, CollectionError> {
        let id = op.id();
        let mut current = self.lock();
        let before = current.membership(id);

        let Some(next) = current.apply(op) else {
            tracing::debug!(id, ?op, "Collection operation is a no-op");
            return Ok(Toggle {
                id,
                before,
                after: before,
            });
        };
        debug_assert!(next.is_consistent());

        self.persist(&current, &next)?;

        *current = next;
        let after = current.membership(id);
        self.publish(&current, None);

        tracing::debug!(id, ?op, ?before, ?after, "Collection updated");
        Ok(Toggle { id, before, after })
    }

    fn persist(&self, current: &Collection, next: &Collection) -> Result<(), CollectionError> {
        if let Err(err) = write_json(&*self.storage, StorageKey::Collection, next) {
            let err = CollectionError::from_write(err);
            tracing::warn!(error = %err, "Failed to save collection; change rolled back");
            self.publish(current, Some(err.clone()));
            return Err(err);
        }
        Ok(())
    }

    fn publish(&self, collection: &Collection, error: Option<CollectionError>) {
        self.snapshot.send_replace(CollectionSnapshot {
            collection: collection.clone(),
            error,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Collection> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
