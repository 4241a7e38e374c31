//! Shared data structures for the application state
//!
//! These structs represent the data model that flows between the
//! persistence layer, the stores, and the search pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Externally assigned species number (National Dex id)
pub type SpeciesId = u32;

/// A single species in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesRef {
    /// Unique, stable id assigned by the API
    pub id: SpeciesId,
    /// Lowercase canonical name (e.g., "mr-mime")
    pub name: String,
    /// Official artwork URL
    pub image_url: String,
    /// Type tags in slot order (empty if unknown)
    pub types: Vec<String>,
}

impl SpeciesRef {
    /// Bulbapedia article for this species.
    ///
    /// "mr-mime" becomes `.../wiki/Mr_Mime_(Pokémon)`.
    pub fn wiki_url(&self) -> String {
        let formatted = self
            .name
            .split(['-', ' '])
            .map(capitalize)
            .collect::<Vec<_>>()
            .join("_");
        format!("https://bulbapedia.bulbagarden.net/wiki/{}_(Pokémon)", formatted)
    }
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The user's caught and wishlisted species.
///
/// Invariant: no id is in both sets. Only the collection store mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub caught: BTreeSet<SpeciesId>,
    #[serde(default)]
    pub wishlist: BTreeSet<SpeciesId>,
}

impl Collection {
    /// Membership of one id
    pub fn membership(&self, id: SpeciesId) -> Membership {
        Membership {
            caught: self.caught.contains(&id),
            wishlisted: self.wishlist.contains(&id),
        }
    }

    /// Whether `caught` and `wishlist` are disjoint
    pub fn is_consistent(&self) -> bool {
        self.caught.is_disjoint(&self.wishlist)
    }

    /// Drop wishlist entries that are also caught.
    ///
    /// Returns the ids that were dropped.
    pub fn normalize(&mut self) -> Vec<SpeciesId> {
        let overlap: Vec<SpeciesId> = self.caught.intersection(&self.wishlist).copied().collect();
        for id in &overlap {
            self.wishlist.remove(id);
        }
        overlap
    }
}

/// Where a single id sits in the collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Membership {
    pub caught: bool,
    pub wishlisted: bool,
}

/// Status tab selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Caught,
    Wishlist,
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatusFilter::All => "all",
            StatusFilter::Caught => "caught",
            StatusFilter::Wishlist => "wishlist",
        })
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "caught" => Ok(StatusFilter::Caught),
            "wishlist" => Ok(StatusFilter::Wishlist),
            other => Err(format!("unknown status filter: {}", other)),
        }
    }
}

/// Per-tab totals shown next to the status tabs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub all: usize,
    pub caught: usize,
    pub wishlist: usize,
}

/// Filter produced by the chat assistant.
///
/// Only `matching_names` and `name_contains` narrow the grid; the other
/// fields are carried along for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticFilterIntent {
    /// Exact species names picked by the assistant
    #[serde(
        default,
        alias = "matching_pokemon_names",
        skip_serializing_if = "Option::is_none"
    )]
    pub matching_names: Option<Vec<String>>,

    /// Substring the name must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,

    /// Minimum base stat (e.g., "strong" maps to 400+)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stat: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn species(name: &str) -> SpeciesRef {
        SpeciesRef {
            id: 1,
            name: name.to_string(),
            image_url: String::new(),
            types: vec![],
        }
    }

    #[test]
    fn test_wiki_url() {
        assert_eq!(
            species("pikachu").wiki_url(),
            "https://bulbapedia.bulbagarden.net/wiki/Pikachu_(Pokémon)"
        );
        assert_eq!(
            species("mr-mime").wiki_url(),
            "https://bulbapedia.bulbagarden.net/wiki/Mr_Mime_(Pokémon)"
        );
    }

    #[test]
    fn test_species_json_is_camel_case() {
        let json = serde_json::to_value(species("eevee")).unwrap();
        assert!(json.get("imageUrl").is_some());
        assert!(json.get("types").is_some());
    }

    #[test]
    fn test_normalize_drops_overlap_from_wishlist() {
        let mut collection = Collection {
            caught: [1, 2].into(),
            wishlist: [2, 3].into(),
        };
        assert!(!collection.is_consistent());

        assert_eq!(collection.normalize(), vec![2]);
        assert!(collection.is_consistent());
        assert_eq!(collection.caught, [1, 2].into());
        assert_eq!(collection.wishlist, [3].into());
    }

    #[test]
    fn test_collection_tolerates_missing_fields() {
        let collection: Collection = serde_json::from_str(r#"{"caught":[4]}"#).unwrap();
        assert_eq!(collection.membership(4), Membership { caught: true, wishlisted: false });
        assert!(collection.wishlist.is_empty());
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("Caught".parse::<StatusFilter>(), Ok(StatusFilter::Caught));
        assert_eq!(" wishlist ".parse::<StatusFilter>(), Ok(StatusFilter::Wishlist));
        assert!("favourites".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_intent_accepts_provider_field_name() {
        let intent: SemanticFilterIntent = serde_json::from_str(
            r#"{"matching_pokemon_names":["pikachu"],"types":["electric"],"generation":1}"#,
        )
        .unwrap();

        assert_eq!(intent.matching_names, Some(vec!["pikachu".to_string()]));
        assert_eq!(intent.types, Some(vec!["electric".to_string()]));
        assert_eq!(intent.generation, Some(1.0));
        assert!(intent.name_contains.is_none());
    }
}
