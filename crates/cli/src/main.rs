//! Folio CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP chat endpoint
//! - `ask`: Answer one question from the terminal
//! - `seed`: Load site content and templates from a JSON file
//! - `templates`: List active prompt templates
//! - `config`: Show, locate or validate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio: grounded question answering for a portfolio site",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to the config file (default: ~/.folio/config.toml)
    #[arg(short, long, global = true, env = "FOLIO_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat endpoint
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question
    Ask {
        /// The question
        message: String,

        /// Continue an existing conversation
        #[arg(short, long)]
        session: Option<String>,

        /// Print the full response envelope as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load documents, portfolio entries and templates from a JSON file
    Seed {
        /// Seed file
        file: PathBuf,
    },

    /// List active prompt templates
    Templates,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Validate the configuration
    Validate,
    /// Print a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask {
            message,
            session,
            json,
        } => commands::ask::run(config_path, message, session, json).await?,
        Commands::Seed { file } => commands::seed::run(config_path, &file).await?,
        Commands::Templates => commands::templates::run(config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path),
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
            ConfigAction::Init => commands::config_cmd::init(),
        },
    }

    Ok(())
}
