/// State management module
///
/// This module handles the user's own data:
/// - Shared data structures (data.rs)
/// - The caught/wishlist collection and its persistence (collection.rs)

pub mod collection;
pub mod data;

pub use collection::{CollectionOp, CollectionSnapshot, CollectionStore, Toggle};
pub use data::{
    Collection, Counts, Membership, SemanticFilterIntent, SpeciesId, SpeciesRef, StatusFilter,
};
