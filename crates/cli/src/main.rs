//! Cadence CLI: the main entry point.
//!
//! Commands:
//! - `init`     : Write a default config with a sample workflow
//! - `run`      : Run the configured workflow on an input
//! - `sessions` : List, show or delete persisted sessions
//! - `status`   : Show provider, model and storage settings

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "cadence",
    about = "Cadence: multi-phase LLM workflows",
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
    log_json: bool,

    /// Config file (defaults to ~/.cadence/config.toml)
    #[arg(short, long, global = true, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Run the configured workflow
    Run {
        /// Input handed to the first phase as `input`
        #[arg(short, long)]
        input: String,

        /// Override the model for every phase
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage persisted sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Show configuration status
    Status,
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List all sessions
    List,
    /// Show one session's messages and context
    Show { id: String },
    /// Delete a session
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
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

    let config_path = cli.config;
    match cli.command {
        Commands::Init { force } => commands::init::run(config_path, force).await?,
        Commands::Run { input, model } => commands::run::run(config_path, input, model).await?,
        Commands::Sessions { action } => match action {
            SessionsAction::List => commands::sessions::list(config_path).await?,
            SessionsAction::Show { id } => commands::sessions::show(config_path, &id).await?,
            SessionsAction::Delete { id } => commands::sessions::delete(config_path, &id).await?,
        },
        Commands::Status => commands::status::run(config_path).await?,
    }

    Ok(())
}
