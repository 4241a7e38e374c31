/// Species index module
///
/// This module handles:
/// - Fetching the species list and type tags from the remote API (api.rs)
/// - Caching the merged index locally with a TTL and retrying failed fetches (cache.rs)

pub mod api;
pub mod cache;

pub use api::PokeApiClient;
pub use cache::{IndexCache, IndexCacheConfig, IndexSnapshot, IndexSource, LoadStatus};

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::FetchError;
use crate::state::SpeciesRef;

/// Species name to its type tags, in slot order
pub type TypeTags = HashMap<String, Vec<String>>;

/// Remote source of the species index.
///
/// `fetch_species` returns records with empty `types`; the cache merges in
/// the result of `fetch_type_tags`.
#[async_trait]
pub trait IndexProvider: Send + Sync {
    /// Fetch every species in one request
    async fn fetch_species(&self) -> Result<Vec<SpeciesRef>, FetchError>;

    /// Fetch the type aggregate and merge it into name -> tags
    async fn fetch_type_tags(&self) -> Result<TypeTags, FetchError>;
}
