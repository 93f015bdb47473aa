//! Jeeves CLI - Quota-aware LLM request gateway
//!
//! A command-line interface for answering prompts through Jeeves'
//! caching, throttling and fallback layer in front of any
//! OpenAI-compatible backend.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use jeeves_core::Config;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Jeeves - Quota-aware LLM request gateway
#[derive(Parser)]
#[command(name = "jeeves")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model to use (overrides config)
    #[arg(short, long, global = true, env = "JEEVES_MODEL")]
    model: Option<String>,

    /// Server port (overrides config)
    #[arg(long, global = true, env = "JEEVES_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "JEEVES_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a one-shot prompt through the gateway
    Ask {
        /// The prompt to send (or read from stdin if not provided)
        prompt: Option<String>,

        /// Language to localize a fallback answer into
        #[arg(long)]
        lang: Option<String>,
    },

    /// Start the Jeeves HTTP server
    Up,

    /// Check server status
    Status,

    /// Show recent usage
    Usage {
        /// Number of recent entries to show
        #[arg(long, default_value = "10")]
        last: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Initialize default configuration
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level);

    // Load configuration
    let mut config = if let Some(path) = &cli.config {
        Config::load_from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(model) = &cli.model {
        config.backend.model = model.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Out-of-range values are a startup error, never clamped
    config.validate()?;

    // Ensure the Jeeves directory exists
    Config::ensure_dirs()?;

    // Run the appropriate command
    match cli.command {
        Commands::Ask { prompt, lang } => commands::ask::run(config, prompt, lang).await,
        Commands::Up => commands::up::run(config).await,
        Commands::Status => commands::status::run(config).await,
        Commands::Usage { last, json } => commands::usage::run(last, json).await,
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(config),
            ConfigCommands::Init { force } => commands::config::init(force),
        },
    }
}
