use std::path::PathBuf;

use clap::{Parser, Subcommand};
use menu_search::commands::{
    init_config, run_delete, run_index, run_search, run_status, run_upsert, show_config,
};
use menu_search::config::Config;

#[derive(Parser)]
#[command(name = "menu-search")]
#[command(about = "Semantic search over application menu catalogs")]
#[command(version)]
struct Cli {
    /// Override the config directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the whole vector collection from a catalog file
    Index {
        /// Path to the catalog JSON document (array of records)
        #[arg(long, default_value = "data/menu.json")]
        file: PathBuf,
        /// Validate and report without touching the index
        #[arg(long)]
        dry_run: bool,
    },
    /// Search the index with a natural-language query
    Search {
        /// Query text
        query: String,
        /// Number of results to return
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
    },
    /// Insert or update a single record from a JSON file
    Upsert {
        /// Path to a JSON file holding one record
        #[arg(long)]
        file: PathBuf,
    },
    /// Remove a single record from the index
    Delete {
        /// Record id
        id: i64,
    },
    /// Show collection and provider health
    Status,
    /// Show or scaffold the configuration
    Config {
        /// Print the active configuration
        #[arg(long)]
        show: bool,
        /// Write a default config file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::default_config_dir()?,
    };
    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Index { file, dry_run } => {
            run_index(&config, &file, dry_run)?;
        }
        Commands::Search { query, top_k } => {
            let top_k = top_k.unwrap_or(config.search.default_top_k);
            run_search(&config, &query, top_k)?;
        }
        Commands::Upsert { file } => {
            run_upsert(&config, &file)?;
        }
        Commands::Delete { id } => {
            run_delete(&config, id)?;
        }
        Commands::Status => {
            run_status(&config)?;
        }
        Commands::Config { show, init } => {
            if init {
                init_config(&config_dir)?;
            }
            if show || !init {
                show_config(&config)?;
            }
        }
    }

    Ok(())
}
