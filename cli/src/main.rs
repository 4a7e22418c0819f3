//! # termgpt Main Entry Point
//!
//! File: cli/src/main.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This file serves as the main entry point for the termgpt CLI, a terminal
//! chat client for a local Ollama model with switchable personas. It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Routing execution to appropriate command handlers
//!
//! ## Architecture
//!
//! - Each top-level command (`chat`, `ask`, ...) is a variant of `Commands`
//! - Global flags (`--config`, `--backend-url`, `--model`, `--timeout-secs`,
//!   `--persona`) become a `ConfigOverrides` handed to every handler
//! - All errors are propagated to this level for consistent handling
//!
//! ## Examples
//!
//! ```bash
//! # Interactive chat
//! termgpt chat
//!
//! # One question to TARS with a different model
//! termgpt --persona tars --model mistral ask how far is the moon
//!
//! # Web terminal, verbose request logging
//! termgpt -v srv --port 8080
//! ```
//!
use clap::{Args, Parser};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

mod commands; // Dispatch surfaces (chat, ask, personas, srv)
mod core; // Config, errors, personas, sessions, filter, inference, service

use crate::core::config::ConfigOverrides;

/// Defines the top-level command-line arguments structure using Clap's derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "termgpt",
    about = "🤖 termgpt: persona-driven terminal chat for local Ollama models",
    long_about = "Chat with a local Ollama model from the terminal or the browser.\n\
                  Switch between personas (AI, TARS, ULTRON, C-3PO) at any time.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(flatten)]
    config: GlobalConfigArgs,
}

/// Flags and environment variables that override configuration files.
#[derive(Args, Debug, Default)]
struct GlobalConfigArgs {
    /// Read configuration from this file only.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Chat endpoint of the Ollama server.
    #[arg(long, global = true, env = "TERMGPT_BACKEND_URL", value_name = "URL")]
    backend_url: Option<String>,

    /// Model name sent with every request.
    #[arg(long, global = true, env = "TERMGPT_MODEL")]
    model: Option<String>,

    /// Seconds to wait for a reply.
    #[arg(long, global = true, env = "TERMGPT_TIMEOUT_SECS", value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Persona to start with (id from `termgpt personas`).
    #[arg(long, global = true, env = "TERMGPT_PERSONA", value_name = "ID")]
    persona: Option<String>,
}

impl From<GlobalConfigArgs> for ConfigOverrides {
    fn from(args: GlobalConfigArgs) -> Self {
        Self {
            config_file: args.config,
            backend_url: args.backend_url,
            model: args.model,
            timeout_secs: args.timeout_secs,
            persona: args.persona,
        }
    }
}

/// Enum defining all available top-level commands.
#[derive(Parser, Debug)]
enum Commands {
    /// Interactive chat in the terminal.
    #[command(alias = "c")]
    Chat(commands::chat::ChatArgs),
    /// Send one message and print the reply.
    #[command(alias = "a")]
    Ask(commands::ask::AskArgs),
    /// List the available personas.
    #[command(alias = "p")]
    Personas(commands::personas::PersonasArgs),
    /// Serve the browser terminal.
    #[command(alias = "s")]
    Srv(commands::srv::SrvArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let overrides = ConfigOverrides::from(cli.config);
    let command_result = match cli.command {
        Commands::Chat(args) => commands::chat::handle_chat(args, &overrides).await,
        Commands::Ask(args) => commands::ask::handle_ask(args, &overrides).await,
        Commands::Personas(args) => commands::personas::handle_personas(args, &overrides).await,
        Commands::Srv(args) => commands::srv::handle_srv(args, &overrides).await,
    };

    if let Err(e) = command_result {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
