//! # Event Harvester CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Create the SQLite database and schema |
//! | `harvest run` | Extract events from the email file and reconcile the store |
//! | `harvest events` | Show grouped events for one day |
//! | `harvest week` | Show grouped events for the next seven days |
//! | `harvest random` | Show one stored event picked at random |
//! | `harvest sweep` | Remove expired and low-quality events |
//! | `harvest serve` | Start the HTTP read API and refresh trigger |
//!
//! ## Examples
//!
//! ```bash
//! harvest init
//! GEMINI_API_KEY=... harvest run --source ./emails.txt
//! harvest events --date 2025-06-09
//! harvest serve --source ./emails.txt
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use event_harvester::{config, events, logging, migrate, run_cmd, server, sweep};

/// Event Harvester: pull event listings out of newsletter emails into a
/// local SQLite calendar.
#[derive(Parser)]
#[command(name = "harvest", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Run the extraction pipeline once and print a report.
    Run {
        /// Email file; overrides `source.path`.
        #[arg(long)]
        source: Option<PathBuf>,

        /// Model API key; overrides `model.api_key`.
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Show grouped events for a day.
    Events {
        /// Day to show (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
    },

    /// Show grouped events for today and the following six days.
    Week,

    /// Show one stored event picked at random.
    Random,

    /// Remove expired and low-quality events without extracting.
    Sweep,

    /// Serve the read API and `POST /refresh` trigger.
    Serve {
        /// Email file read on refresh; overrides `source.path`.
        #[arg(long)]
        source: Option<PathBuf>,

        /// Model API key; overrides `model.api_key`.
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run { source, api_key } => {
            run_cmd::run_pipeline(&cfg, source, api_key).await?;
        }
        Commands::Events { date } => {
            events::run_events(&cfg, date).await?;
        }
        Commands::Week => {
            events::run_week(&cfg).await?;
        }
        Commands::Random => {
            events::run_random(&cfg).await?;
        }
        Commands::Sweep => {
            sweep::run_sweep(&cfg).await?;
        }
        Commands::Serve { source, api_key } => {
            let source = run_cmd::resolve_source(source, &cfg)?;
            let api_key = run_cmd::resolve_api_key(api_key, &cfg)?;
            let (pipeline, _pool) = run_cmd::build_pipeline(&cfg, api_key).await?;
            server::run_server(&cfg, pipeline, source).await?;
        }
    }

    Ok(())
}
