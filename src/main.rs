//! # Photodesk CLI (`pdesk`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdesk search "<prompt>" --candidates FILE` | Rank candidates and caption the top results |
//! | `pdesk pending add ...` | Queue a caption for a photo about to be downloaded |
//! | `pdesk pending list` | Show queued captions and their match status |
//! | `pdesk watch` | Inject queued captions into new downloads |
//! | `pdesk serve` | Start the caption rewrite HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Template captions only, JSON output with the score breakdown
//! pdesk search "supreme court ruling" --candidates scraped.json --json --explain
//!
//! # One reconciliation pass with debug logging
//! pdesk --config ./photodesk.toml watch --once --verbose
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use photodesk::config;
use photodesk::inject::CaptionInjector;
use photodesk::llm::OpenAiClient;
use photodesk::pending::{self, PendingStore};
use photodesk::search::{self, SearchOptions};
use photodesk::server;
use photodesk::watcher::Watcher;
use photodesk_core::caption::LlmClient;

/// Photodesk: rank news-photo candidates, rewrite their captions, and
/// reconcile downloads against queued captions.
#[derive(Parser)]
#[command(name = "pdesk", version)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank candidate photos for a story prompt and caption the top results.
    Search {
        /// Story or photo prompt.
        prompt: String,

        /// JSON file of raw provider candidates.
        #[arg(long)]
        candidates: PathBuf,

        /// Number of results (defaults to `search.top`).
        #[arg(long)]
        top: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,

        /// Include the per-feature score breakdown.
        #[arg(long)]
        explain: bool,
    },

    /// Manage pending caption records.
    Pending {
        #[command(subcommand)]
        action: PendingAction,
    },

    /// Watch the downloads folder and inject queued captions.
    Watch {
        /// Run a single tick and exit.
        #[arg(long)]
        once: bool,

        /// Debug logging, including skip reasons.
        #[arg(long)]
        verbose: bool,
    },

    /// Start the caption rewrite HTTP API.
    Serve,
}

#[derive(Subcommand)]
enum PendingAction {
    /// Queue a caption for a photo page.
    Add {
        #[arg(long)]
        page_url: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        caption: String,

        /// Provider asset id. Taken from a numeric URL tail when omitted.
        #[arg(long)]
        asset_id: Option<String>,
    },

    /// List pending records.
    List,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Watch { verbose: true, .. });
    init_logging(verbose);

    let cfg = config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Search {
            prompt,
            candidates,
            top,
            json,
            explain,
        } => {
            let opts = SearchOptions { top, json, explain };
            search::run_search(&cfg, &prompt, &candidates, &opts)?;
        }
        Commands::Pending { action } => {
            let store = PendingStore::new(&cfg.watcher.pending_path);
            let now = chrono::Utc::now().timestamp();
            match action {
                PendingAction::Add {
                    page_url,
                    title,
                    caption,
                    asset_id,
                } => {
                    let record =
                        pending::new_record(&page_url, &title, &caption, asset_id.as_deref(), now);
                    let id = record.id.clone();
                    store.append(record)?;
                    println!("Queued {}", id);
                }
                PendingAction::List => {
                    pending::print_records(&store.load(), now);
                }
            }
        }
        Commands::Watch { once, .. } => {
            let mut watcher = Watcher::new(&cfg.watcher, CaptionInjector);
            watcher.run(once)?;
        }
        Commands::Serve => {
            // The blocking HTTP client has to be built and dropped outside
            // the async runtime, so it is declared before it.
            let client: Arc<dyn LlmClient> = Arc::new(OpenAiClient::from_config(&cfg.llm)?);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::run_server(&cfg, client.clone()))?;
        }
    }

    Ok(())
}
