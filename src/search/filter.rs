//! Pure filter stages
//!
//! Order matters: the semantic intent narrows the index first, the text
//! query narrows it further, counts are taken from that result, and the
//! status filter runs last so that switching tabs never changes counts.

use std::collections::HashSet;

use crate::config::MIN_NAME_QUERY_LEN;
use crate::state::{Collection, Counts, SemanticFilterIntent, SpeciesRef, StatusFilter};

/// How a debounced query string is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Empty, or too short to search by name
    Any,
    /// All digits: exact id match
    Id(u64),
    /// All digits but out of range, so nothing can match
    NoId,
    /// Lowercased substring of the name
    Name(String),
}

impl Query {
    pub fn parse(raw: &str) -> Self {
        let query = raw.trim().to_lowercase();
        if query.is_empty() {
            return Query::Any;
        }
        if query.chars().all(|c| c.is_ascii_digit()) {
            return match query.parse() {
                Ok(id) => Query::Id(id),
                Err(_) => Query::NoId,
            };
        }
        if query.chars().count() < MIN_NAME_QUERY_LEN {
            return Query::Any;
        }
        Query::Name(query)
    }

    pub fn matches(&self, species: &SpeciesRef) -> bool {
        match self {
            Query::Any => true,
            Query::Id(id) => u64::from(species.id) == *id,
            Query::NoId => false,
            Query::Name(needle) => species.name.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Compiled form of a semantic intent
struct SemanticMatcher {
    names: Option<HashSet<String>>,
    contains: Option<String>,
}

impl SemanticMatcher {
    fn new(intent: &SemanticFilterIntent) -> Self {
        let names = intent
            .matching_names
            .as_ref()
            .filter(|names| !names.is_empty())
            .map(|names| names.iter().map(|n| n.to_lowercase()).collect());
        let contains = intent
            .name_contains
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase());
        Self { names, contains }
    }

    fn matches(&self, species: &SpeciesRef) -> bool {
        let name = species.name.to_lowercase();
        if let Some(names) = &self.names {
            if !names.contains(&name) {
                return false;
            }
        }
        if let Some(needle) = &self.contains {
            if !name.contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Whether one species passes the status tab
pub fn status_matches(status: StatusFilter, collection: &Collection, species: &SpeciesRef) -> bool {
    match status {
        StatusFilter::All => true,
        StatusFilter::Caught => collection.caught.contains(&species.id),
        StatusFilter::Wishlist => collection.wishlist.contains(&species.id),
    }
}

/// Per-tab counts over already searched species
pub fn count(searched: &[&SpeciesRef], collection: &Collection) -> Counts {
    Counts {
        all: searched.len(),
        caught: searched
            .iter()
            .filter(|s| collection.caught.contains(&s.id))
            .count(),
        wishlist: searched
            .iter()
            .filter(|s| collection.wishlist.contains(&s.id))
            .count(),
    }
}

/// The rendered list and its tab counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredView {
    /// Index order preserved
    pub species: Vec<SpeciesRef>,
    pub counts: Counts,
}

impl FilteredView {
    pub fn names(&self) -> Vec<&str> {
        self.species.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Run every stage over the index
pub fn filter_view(
    index: &[SpeciesRef],
    collection: &Collection,
    debounced_query: &str,
    status: StatusFilter,
    intent: Option<&SemanticFilterIntent>,
) -> FilteredView {
    let semantic = intent.map(SemanticMatcher::new);
    let query = Query::parse(debounced_query);

    let searched: Vec<&SpeciesRef> = index
        .iter()
        .filter(|s| semantic.as_ref().map_or(true, |m| m.matches(s)))
        .filter(|s| query.matches(s))
        .collect();

    let counts = count(&searched, collection);
    let species = searched
        .into_iter()
        .filter(|s| status_matches(status, collection, s))
        .cloned()
        .collect();

    FilteredView { species, counts }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn species(id: u32, name: &str) -> SpeciesRef {
        SpeciesRef {
            id,
            name: name.to_string(),
            image_url: String::new(),
            types: vec![],
        }
    }

    fn index() -> Vec<SpeciesRef> {
        vec![
            species(1, "bulbasaur"),
            species(2, "ivysaur"),
            species(25, "pikachu"),
            species(26, "raichu"),
            species(172, "pichu"),
        ]
    }

    fn collection(caught: &[u32], wishlist: &[u32]) -> Collection {
        Collection {
            caught: caught.iter().copied().collect(),
            wishlist: wishlist.iter().copied().collect(),
        }
    }

    #[test]
    fn test_query_parse() {
        assert_eq!(Query::parse(""), Query::Any);
        assert_eq!(Query::parse("   "), Query::Any);
        assert_eq!(Query::parse(" 025 "), Query::Id(25));
        assert_eq!(Query::parse("99999999999999999999999"), Query::NoId);
        assert_eq!(Query::parse("pi"), Query::Any);
        assert_eq!(Query::parse("SAUR"), Query::Name("saur".into()));
    }

    #[test]
    fn test_search_tiering() {
        let index = index();
        let empty = Collection::default();
        let run = |q: &str| filter_view(&index, &empty, q, StatusFilter::All, None);

        assert_eq!(run("25").names(), vec!["pikachu"]);
        assert_eq!(run("pi").species.len(), index.len());
        assert_eq!(run("saur").names(), vec!["bulbasaur", "ivysaur"]);
        assert_eq!(run("Chu ").names(), vec!["pikachu", "raichu", "pichu"]);
        assert!(run("999").species.is_empty());
    }

    #[test]
    fn test_semantic_then_status() {
        let index = index();
        let collection = collection(&[25], &[26]);
        let intent = SemanticFilterIntent {
            matching_names: Some(vec!["Pikachu".into(), "raichu".into()]),
            ..Default::default()
        };

        let view = filter_view(&index, &collection, "", StatusFilter::Caught, Some(&intent));
        assert_eq!(view.names(), vec!["pikachu"]);
        assert_eq!(
            view.counts,
            Counts {
                all: 2,
                caught: 1,
                wishlist: 1
            }
        );
    }

    #[test]
    fn test_semantic_name_contains_and_list_combine() {
        let index = index();
        let intent = SemanticFilterIntent {
            matching_names: Some(vec!["pikachu".into(), "pichu".into(), "bulbasaur".into()]),
            name_contains: Some("CHU".into()),
            ..Default::default()
        };

        let view = filter_view(&index, &Collection::default(), "", StatusFilter::All, Some(&intent));
        assert_eq!(view.names(), vec!["pikachu", "pichu"]);
    }

    #[test]
    fn test_empty_intent_passes_everything() {
        let index = index();
        let intent = SemanticFilterIntent {
            matching_names: Some(vec![]),
            name_contains: Some(String::new()),
            types: Some(vec!["fire".into()]),
            ..Default::default()
        };

        let view = filter_view(&index, &Collection::default(), "", StatusFilter::All, Some(&intent));
        assert_eq!(view.species.len(), index.len());
    }

    #[test]
    fn test_counts_follow_search_not_status() {
        let index = index();
        let collection = collection(&[25], &[1]);

        let view = filter_view(&index, &collection, "pika", StatusFilter::Wishlist, None);
        assert!(view.species.is_empty());
        assert_eq!(
            view.counts,
            Counts {
                all: 1,
                caught: 1,
                wishlist: 0
            }
        );
    }

    #[test]
    fn test_order_is_index_order() {
        let index = index();
        let collection = collection(&[172, 1, 26], &[]);

        let view = filter_view(&index, &collection, "", StatusFilter::Caught, None);
        assert_eq!(view.names(), vec!["bulbasaur", "raichu", "pichu"]);
    }
}
