/// Search and filter module
///
/// This module handles:
/// - The pure filter stages and counts (filter.rs)
/// - Debouncing the free-text query (debounce.rs)
/// - The pipeline that holds search state and derives the view (this file)

pub mod debounce;
pub mod filter;

pub use debounce::Debouncer;
pub use filter::{filter_view, FilteredView, Query};

use std::time::Duration;
use tokio::sync::watch;

use crate::config::SEARCH_DEBOUNCE;
use crate::state::{Collection, SemanticFilterIntent, SpeciesRef, StatusFilter};

/// Pipeline timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Quiet period before a typed query is applied
    pub debounce: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: SEARCH_DEBOUNCE,
        }
    }
}

/// What the user has asked for so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    /// Text as typed
    pub raw_query: String,
    /// Text the view is computed from
    pub debounced_query: String,
    pub status_filter: StatusFilter,
}

/// Search state plus the optional semantic filter.
///
/// Owns no persistent data. The view is recomputed on demand from the
/// index and the collection passed in.
pub struct SearchPipeline {
    raw_query: String,
    status_filter: StatusFilter,
    intent: Option<SemanticFilterIntent>,
    debouncer: Debouncer<String>,
}

impl Default for SearchPipeline {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl SearchPipeline {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            raw_query: String::new(),
            status_filter: StatusFilter::All,
            intent: None,
            debouncer: Debouncer::new(String::new(), config.debounce),
        }
    }

    /// Update the typed query; the view follows after the debounce delay
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.raw_query = query.into();
        self.debouncer.schedule(self.raw_query.clone());
    }

    /// Apply the typed query immediately
    pub fn flush(&mut self) {
        self.debouncer.flush(self.raw_query.clone());
    }

    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }

    pub fn debounced_query(&self) -> String {
        self.debouncer.current()
    }

    /// Notified each time the debounced query settles
    pub fn subscribe_query(&self) -> watch::Receiver<String> {
        self.debouncer.subscribe()
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.status_filter = status;
    }

    pub fn status_filter(&self) -> StatusFilter {
        self.status_filter
    }

    pub fn set_intent(&mut self, intent: SemanticFilterIntent) {
        tracing::debug!(?intent, "Semantic filter applied");
        self.intent = Some(intent);
    }

    pub fn clear_intent(&mut self) {
        self.intent = None;
    }

    pub fn intent(&self) -> Option<&SemanticFilterIntent> {
        self.intent.as_ref()
    }

    pub fn state(&self) -> SearchState {
        SearchState {
            raw_query: self.raw_query.clone(),
            debounced_query: self.debounced_query(),
            status_filter: self.status_filter,
        }
    }

    /// Derive the list to render and the tab counts
    pub fn view(&self, index: &[SpeciesRef], collection: &Collection) -> FilteredView {
        filter_view(
            index,
            collection,
            &self.debounced_query(),
            self.status_filter,
            self.intent.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Counts;
    use tokio::time::sleep;

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
            species(4, "charmander"),
            species(25, "pikachu"),
            species(26, "raichu"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_is_debounced() {
        let mut pipeline = SearchPipeline::default();
        let index = index();
        let collection = Collection::default();

        pipeline.set_query("a");
        sleep(Duration::from_millis(200)).await;
        pipeline.set_query("char");
        assert_eq!(pipeline.raw_query(), "char");
        assert_eq!(pipeline.debounced_query(), "");
        assert_eq!(pipeline.view(&index, &collection).species.len(), 4);

        // 300 ms counts from the last change, not the first
        sleep(Duration::from_millis(299)).await;
        assert_eq!(pipeline.debounced_query(), "");

        sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(pipeline.debounced_query(), "char");
        assert_eq!(pipeline.view(&index, &collection).names(), vec!["charmander"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_applies_immediately() {
        let mut pipeline = SearchPipeline::default();
        pipeline.set_query("26");
        pipeline.flush();

        assert_eq!(
            pipeline.state(),
            SearchState {
                raw_query: "26".into(),
                debounced_query: "26".into(),
                status_filter: StatusFilter::All,
            }
        );
        assert_eq!(pipeline.view(&index(), &Collection::default()).names(), vec!["raichu"]);

        // The cancelled timer never publishes a stale value
        sleep(Duration::from_secs(1)).await;
        assert_eq!(pipeline.debounced_query(), "26");
    }

    #[tokio::test]
    async fn test_intent_and_status_compose() {
        let mut pipeline = SearchPipeline::default();
        let collection = Collection {
            caught: [25, 1].into(),
            wishlist: [26].into(),
        };

        pipeline.set_intent(SemanticFilterIntent {
            matching_names: Some(vec!["pikachu".into(), "raichu".into()]),
            ..Default::default()
        });
        pipeline.set_status_filter(StatusFilter::Caught);

        let view = pipeline.view(&index(), &collection);
        assert_eq!(view.names(), vec!["pikachu"]);
        assert_eq!(
            view.counts,
            Counts {
                all: 2,
                caught: 1,
                wishlist: 1
            }
        );

        pipeline.clear_intent();
        assert!(pipeline.intent().is_none());
        assert_eq!(pipeline.view(&index(), &collection).names(), vec!["bulbasaur", "pikachu"]);
    }
}
