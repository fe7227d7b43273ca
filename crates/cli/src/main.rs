//! packrat CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Interactive conversation with memory slash-commands
//! - `ingest`  — Index documents into the retrieval store
//! - `memory`  — Inspect or prune user memory
//! - `serve`   — Start the HTTP gateway

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use packrat_config::PackratConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "packrat",
    about = "packrat — bounded-context chat engine with rolling compaction",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (TOML)
    #[arg(long, global = true, default_value = "./packrat.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively in one conversation
    Chat {
        /// Conversation id
        #[arg(long)]
        cid: String,

        /// User id (scopes memory facts)
        #[arg(long, default_value = "default")]
        uid: String,

        /// Print the turn trace after every reply
        #[arg(long)]
        debug: bool,
    },

    /// Index documents (txt/md) into the retrieval store
    Ingest {
        /// Paths to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Delete previously indexed chunks from these sources first
        #[arg(long)]
        replace: bool,
    },

    /// Inspect or prune user memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,

        /// User id
        #[arg(long, default_value = "default")]
        uid: String,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// List all facts
    List,
    /// Forget one fact by id
    Forget { fact_id: String },
    /// Forget every fact with a key
    ForgetKey { key: String },
    /// Forget everything
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = PackratConfig::load_with_env(&cli.config)?;

    match cli.command {
        Commands::Chat { cid, uid, debug } => commands::chat::run(config, &cid, &uid, debug).await?,
        Commands::Ingest { paths, replace } => {
            commands::ingest::run(config, &paths, replace).await?
        }
        Commands::Memory { action, uid } => commands::memory::run(config, action, &uid).await?,
        Commands::Serve { port } => commands::serve::run(config, port).await?,
    }

    Ok(())
}
