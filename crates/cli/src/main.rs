//! spotctl CLI: the main entry point.
//!
//! Commands:
//! - `auth`: Log in to Spotify and store the tokens
//! - `tools`: List the action catalog
//! - `run`: Execute one action through the engine
//! - `ask`: Run the agent loop on a prompt
//! - `status`: Show configuration and auth status
//! - `config`: Print the config path and a default config

use clap::{Parser, Subcommand};
use spotctl_core::action::ActionCategory;
use std::path::PathBuf;

mod commands;
mod session;

#[derive(Parser)]
#[command(name = "spotctl", about = "Drive Spotify from the terminal or an LLM", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to Spotify (authorization-code flow) and store the tokens
    Auth,

    /// List available actions
    Tools {
        /// Only actions in this category
        #[arg(short, long)]
        category: Option<ActionCategory>,

        /// Only actions callable with these permissions (repeatable)
        #[arg(short, long = "permission")]
        permissions: Vec<String>,

        /// Print registry statistics instead of the list
        #[arg(long)]
        stats: bool,
    },

    /// Execute a single action and print the result envelope
    Run {
        /// Action name, e.g. `get_user_playlists`
        action: String,

        /// Parameters as a JSON object
        #[arg(short, long)]
        params: Option<String>,
    },

    /// Ask the assistant
    Ask {
        prompt: String,

        /// Stream the answer (default from config)
        #[arg(long, conflicts_with = "no_stream")]
        stream: bool,

        #[arg(long)]
        no_stream: bool,

        /// Override `agent.max_steps`
        #[arg(long)]
        max_steps: Option<u32>,

        /// Offer only actions from this category
        #[arg(short, long)]
        category: Option<ActionCategory>,

        /// Offer only these actions (repeatable)
        #[arg(short, long = "tool")]
        tools: Vec<String>,

        /// Session file to resume from and save back to
        #[arg(short, long)]
        session: Option<PathBuf>,
    },

    /// Show configuration and authentication status
    Status,

    /// Print the config path and a default config
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Auth => commands::auth::run().await?,
        Commands::Tools {
            category,
            permissions,
            stats,
        } => commands::tools::run(category, permissions, stats)?,
        Commands::Run { action, params } => commands::run::run(&action, params.as_deref()).await?,
        Commands::Ask {
            prompt,
            stream,
            no_stream,
            max_steps,
            category,
            tools,
            session,
        } => {
            let streaming = match (stream, no_stream) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            commands::ask::run(commands::ask::AskOptions {
                prompt,
                streaming,
                max_steps,
                category,
                tools,
                session,
            })
            .await?
        }
        Commands::Status => commands::status::run()?,
        Commands::Config => commands::config_cmd::run()?,
    }

    Ok(())
}
