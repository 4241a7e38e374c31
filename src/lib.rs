//! Pokemon Collector data layer
//!
//! Three stores feed one derived view:
//! - [`index::IndexCache`] fetches and caches the species index
//! - [`state::CollectionStore`] owns the caught and wishlist sets
//! - [`search::SearchPipeline`] filters the index into what is shown
//!
//! Storage, the remote API, the clock and the chat assistant are injected
//! as trait objects so that every store can be driven in tests.

pub mod clock;
pub mod config;
pub mod error;
pub mod index;
pub mod search;
pub mod semantic;
pub mod state;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CollectionError, FetchError, SemanticError, StorageError};
pub use index::{IndexCache, IndexCacheConfig, IndexProvider, IndexSnapshot, LoadStatus, PokeApiClient};
pub use search::{FilteredView, SearchConfig, SearchPipeline, SearchState};
pub use semantic::{request_semantic_filter, Credential, SemanticFilterProvider, SemanticReply};
pub use state::{
    Collection, CollectionSnapshot, CollectionStore, Counts, Membership, SemanticFilterIntent,
    SpeciesId, SpeciesRef, StatusFilter,
};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageKey};
