use anyhow::Context;
use clap::Parser;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use pokemon_collector::config::CliArgs;
use pokemon_collector::{
    CollectionStore, IndexCache, KeyValueStore, LoadStatus, PokeApiClient, SearchPipeline,
    SemanticFilterIntent, SpeciesId, SpeciesRef, SqliteStore, StatusFilter, SystemClock,
};

/// How many rows `show` prints
const PAGE_SIZE: usize = 20;

/// Main application state
struct Collector {
    index: IndexCache,
    collection: CollectionStore,
    search: SearchPipeline,
}

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
enum Message {
    /// Set the search text and apply it immediately
    Search(String),
    /// Switch status tab
    Filter(StatusFilter),
    Catch(SpeciesId),
    Wish(SpeciesId),
    /// Restart the index load after a failure
    Retry,
    /// Apply an assistant filter given as JSON
    Intent(SemanticFilterIntent),
    ClearIntent,
    /// Print the Bulbapedia link of one species
    Wiki(SpeciesId),
    Show,
    Help,
    Quit,
}

impl FromStr for Message {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (command, arg) = line
            .split_once(char::is_whitespace)
            .map(|(c, a)| (c, a.trim()))
            .unwrap_or((line, ""));

        let id = |arg: &str| {
            arg.parse::<SpeciesId>()
                .map_err(|_| format!("expected a species id, got '{}'", arg))
        };

        match command {
            "search" | "s" => Ok(Message::Search(arg.to_string())),
            "filter" | "f" => StatusFilter::from_str(arg).map(Message::Filter),
            "catch" | "c" => id(arg).map(Message::Catch),
            "wish" | "w" => id(arg).map(Message::Wish),
            "retry" => Ok(Message::Retry),
            "intent" | "i" => serde_json::from_str(arg)
                .map(Message::Intent)
                .map_err(|err| format!("invalid intent JSON: {}", err)),
            "wiki" => id(arg).map(Message::Wiki),
            "clear-intent" => Ok(Message::ClearIntent),
            "show" | "" => Ok(Message::Show),
            "help" | "?" => Ok(Message::Help),
            "quit" | "q" | "exit" => Ok(Message::Quit),
            other => Err(format!("unknown command '{}' (try 'help')", other)),
        }
    }
}

impl Collector {
    /// Handle one message. Returns false when the session should end.
    async fn update(&mut self, message: Message) -> bool {
        match message {
            Message::Search(query) => {
                self.search.set_query(query);
                self.search.flush();
                self.view();
            }
            Message::Filter(status) => {
                self.search.set_status_filter(status);
                self.view();
            }
            Message::Catch(id) => match self.collection.toggle_caught(id) {
                Ok(toggle) if toggle.after.caught => println!("✅ #{} caught", id),
                Ok(_) => println!("↩️  #{} released", id),
                Err(err) => println!("⚠️  {}", err.user_message()),
            },
            Message::Wish(id) => match self.collection.toggle_wishlist(id) {
                Ok(toggle) if toggle.is_noop() => println!("ℹ️  #{} is already caught", id),
                Ok(toggle) if toggle.after.wishlisted => println!("⭐ #{} added to wishlist", id),
                Ok(_) => println!("↩️  #{} removed from wishlist", id),
                Err(err) => println!("⚠️  {}", err.user_message()),
            },
            Message::Retry => {
                match self.index.retry().await {
                    Ok(species) => println!("✅ Loaded {} species", species.len()),
                    Err(err) => println!("⚠️  Failed to load Pokemon list: {}", err),
                }
            }
            Message::Intent(intent) => {
                self.search.set_intent(intent);
                self.view();
            }
            Message::ClearIntent => {
                self.search.clear_intent();
                self.view();
            }
            Message::Wiki(id) => {
                match wiki_link(&self.index.snapshot().species, id) {
                    Some(url) => println!("📖 {}", url),
                    None => println!("⚠️  No species with id {}", id),
                }
            }
            Message::Show => self.view(),
            Message::Help => print_help(),
            Message::Quit => return false,
        }
        true
    }

    /// Print the current page of results
    fn view(&self) {
        let snapshot = self.index.snapshot();
        if snapshot.status == LoadStatus::Failed {
            println!("⚠️  Index unavailable. Type 'retry' to try again.");
            return;
        }

        let collection = self.collection.snapshot().collection;
        let view = self.search.view(&snapshot.species, &collection);
        println!(
            "📊 All {} | Caught {} | Wishlist {}   [{}]",
            view.counts.all,
            view.counts.caught,
            view.counts.wishlist,
            self.search.status_filter()
        );

        for species in view.species.iter().take(PAGE_SIZE) {
            let membership = collection.membership(species.id);
            let mark = match (membership.caught, membership.wishlisted) {
                (true, _) => "●",
                (_, true) => "☆",
                _ => " ",
            };
            println!(
                "{} #{:<5} {:<24} {}",
                mark,
                species.id,
                species.name,
                species.types.join("/")
            );
        }
        if view.species.len() > PAGE_SIZE {
            println!("   … {} more", view.species.len() - PAGE_SIZE);
        }
    }
}

/// Bulbapedia link of `id`, if it is in the index
fn wiki_link(index: &[SpeciesRef], id: SpeciesId) -> Option<String> {
    index.iter().find(|s| s.id == id).map(SpeciesRef::wiki_url)
}

fn print_help() {
    println!("Commands:");
    println!("  search <text>     name (3+ letters) or exact id");
    println!("  filter <tab>      all | caught | wishlist");
    println!("  catch <id>        toggle caught");
    println!("  wish <id>         toggle wishlist");
    println!("  retry             reload the species index");
    println!("  intent <json>     apply an assistant filter, e.g. {{\"nameContains\":\"chu\"}}");
    println!("  clear-intent      drop the assistant filter");
    println!("  wiki <id>         print the Bulbapedia link");
    println!("  show | help | quit");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let db_path = args
        .db_path()
        .context("Could not determine a data directory; pass --data-dir")?;
    let store = match args.max_pages {
        Some(pages) => SqliteStore::open_with_page_limit(&db_path, pages),
        None => SqliteStore::open(&db_path),
    }
    .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let storage: Arc<dyn KeyValueStore> = Arc::new(store);

    let mut app = Collector {
        index: IndexCache::new(
            storage.clone(),
            Arc::new(PokeApiClient::new(&args.api_url, &args.image_url)),
            Arc::new(SystemClock),
            args.index_config(),
        ),
        collection: CollectionStore::open(storage),
        search: SearchPipeline::new(args.search_config()),
    };

    let snapshot = app.collection.snapshot();
    if let Some(err) = &snapshot.error {
        println!("⚠️  {}", err.user_message());
    }
    println!(
        "🎮 Pokemon Collector: {} caught, {} on wishlist",
        snapshot.collection.caught.len(),
        snapshot.collection.wishlist.len()
    );

    match app.index.load().await {
        Ok(species) => println!("✅ {} species ready", species.len()),
        Err(err) => println!("⚠️  Failed to load Pokemon list: {}", err),
    }
    app.view();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.parse::<Message>() {
            Ok(message) => {
                if !app.update(message).await {
                    break;
                }
            }
            Err(err) => println!("⚠️  {}", err),
        }
    }

    println!("👋 Bye");
    Ok(())
}
