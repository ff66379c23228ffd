// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concierge - a conversational product concierge.
//!
//! This is the binary entry point: it loads configuration, wires the
//! OpenAI-compatible adapters, SQLite storage and SMTP delivery into a
//! [`concierge_agent::ChatEngine`], and runs one of the subcommands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod services;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

/// Concierge - a conversational product concierge.
#[derive(Parser, Debug)]
#[command(name = "concierge", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by the conversational subcommands.
#[derive(clap::Args, Debug, Clone)]
pub struct SessionArgs {
    /// Reply language (`en` or `zh`).
    #[arg(long, default_value = "en")]
    pub locale: String,

    /// Conversation id to resume. The REPL starts a fresh one when omitted.
    #[arg(long)]
    pub conversation: Option<String>,

    /// Permit side-effecting tools such as sending an inquiry.
    #[arg(long)]
    pub allow_actions: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive chat session streaming the assistant's replies.
    Chat(SessionArgs),
    /// Answer a single message and print the response as JSON.
    Ask {
        message: String,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Build the product, knowledge and intent indices and report their sizes.
    Index,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration, then print a summary.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => concierge_config::load_and_validate_path(path),
        None => concierge_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            concierge_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.engine.log_level);

    let result = match cli.command {
        Some(Commands::Chat(session)) => shell::run_chat(&config, session).await,
        Some(Commands::Ask { message, session }) => {
            commands::run_ask(&config, message, session).await
        }
        Some(Commands::Index) => commands::run_index(&config).await,
        Some(Commands::Config {
            action: ConfigCommand::Check,
        }) => {
            commands::print_config_summary(&config);
            Ok(())
        }
        None => {
            println!("concierge: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

/// Logs go to stderr so `ask` output on stdout stays valid JSON. `RUST_LOG`
/// overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("concierge={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
