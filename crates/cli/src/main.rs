//! cmdloop CLI: the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP gateway
//! - `run`     — Run one instruction through the loop in the terminal
//! - `doctor`  — Diagnose configuration, provider and executor
//! - `config`  — Show, locate or initialize the config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "cmdloop",
    about = "cmdloop — an LLM that proposes shell commands, runs them, and reads the results",
    version
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
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Run a single instruction and stream the loop to stdout
    Run {
        /// What the agent should do
        #[arg(short, long)]
        instruction: String,

        /// Only propose commands, never execute them
        #[arg(long)]
        no_auto_execute: bool,

        /// Override the iteration limit
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// Print raw NDJSON frames instead of text
        #[arg(long)]
        json: bool,
    },

    /// Diagnose system health
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so `run --json` output stays machine-readable
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Serve { port, host } => commands::serve::run(port, host).await?,
        Commands::Run {
            instruction,
            no_auto_execute,
            max_iterations,
            json,
        } => {
            let overrides = commands::run::Overrides {
                auto_execute: no_auto_execute.then_some(false),
                max_iterations,
            };
            commands::run::run(instruction, overrides, json).await?
        }
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
    }

    Ok(())
}
