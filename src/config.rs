//! Application configuration
//!
//! Constants that define the behaviour of the data layer, plus the
//! command-line arguments of the terminal driver. Every argument can also
//! be supplied through a `POKEMON_COLLECTOR_*` environment variable.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::index::IndexCacheConfig;
use crate::search::SearchConfig;

/// Namespace prefix for every persisted key
pub const STORAGE_PREFIX: &str = "pokemon-collector";

/// How long a cached species index stays fresh (24 hours)
pub const INDEX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Delay before the single internal retry of a failed index fetch
pub const INDEX_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Quiet period before the search query is applied
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Name queries shorter than this pass everything through
pub const MIN_NAME_QUERY_LEN: usize = 3;

/// Default PokeAPI endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://pokeapi.co/api/v2";

/// Official artwork sprites, addressed by species id
pub const DEFAULT_IMAGE_BASE_URL: &str =
    "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/other/official-artwork";

/// Page size large enough to fetch the whole index in one request
pub const SPECIES_LIST_LIMIT: u32 = 10_000;

/// Command-line arguments for the terminal driver
#[derive(Parser, Debug, Clone)]
#[command(name = "pokemon-collector", about = "Browse the species index and track your collection")]
pub struct CliArgs {
    /// Base URL of the species API
    #[arg(long, default_value = DEFAULT_API_BASE_URL, env = "POKEMON_COLLECTOR_API_URL")]
    pub api_url: String,

    /// Base URL for species artwork
    #[arg(long, default_value = DEFAULT_IMAGE_BASE_URL, env = "POKEMON_COLLECTOR_IMAGE_URL")]
    pub image_url: String,

    /// Directory holding the local database (defaults to the user data directory)
    #[arg(long, env = "POKEMON_COLLECTOR_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Hours before the cached index is refreshed
    #[arg(long, default_value = "24", env = "POKEMON_COLLECTOR_CACHE_TTL_HOURS")]
    pub cache_ttl_hours: u64,

    /// Delay in milliseconds before retrying a failed index fetch
    #[arg(long, default_value = "3000", env = "POKEMON_COLLECTOR_RETRY_DELAY_MS")]
    pub retry_delay_ms: u64,

    /// Search debounce in milliseconds
    #[arg(long, default_value = "300", env = "POKEMON_COLLECTOR_DEBOUNCE_MS")]
    pub debounce_ms: u64,

    /// Cap the database at this many pages (simulates a storage quota)
    #[arg(long, env = "POKEMON_COLLECTOR_MAX_PAGES")]
    pub max_pages: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "POKEMON_COLLECTOR_LOG_LEVEL")]
    pub log_level: String,
}

impl CliArgs {
    /// Index cache settings derived from the arguments
    pub fn index_config(&self) -> IndexCacheConfig {
        IndexCacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_hours.saturating_mul(60 * 60)),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Search settings derived from the arguments
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    /// Where the database file lives.
    ///
    /// Falls back to the platform data directory:
    /// - Linux: ~/.local/share/pokemon-collector/collector.db
    /// - macOS: ~/Library/Application Support/pokemon-collector/collector.db
    /// - Windows: %APPDATA%\pokemon-collector\collector.db
    pub fn db_path(&self) -> Option<PathBuf> {
        let mut path = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => {
                let mut base = dirs::data_dir().or_else(dirs::home_dir)?;
                base.push(STORAGE_PREFIX);
                base
            }
        };
        path.push("collector.db");
        Some(path)
    }
}
