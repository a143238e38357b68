//! chainlist CLI
//!
//! Command-line interface for chainlist - a to-do list kept on a remote ledger.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chainlist_core::Config;

mod backend;
mod commands;
mod output;
mod tui;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "chainlist")]
#[command(about = "chainlist - a to-do list kept on a remote ledger")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TUI interface
    Tui,
    /// List all entries
    #[command(alias = "ls")]
    List,
    /// Add an entry
    Add {
        /// Entry text
        text: String,
    },
    /// Toggle an entry between open and completed
    Toggle {
        /// Position shown by `list`
        index: usize,
    },
    /// Delete an entry
    #[command(alias = "rm")]
    Delete {
        /// Position shown by `list`
        index: usize,
    },
    /// Replace an entry's text (the entry moves to the end of the list)
    Edit {
        /// Position shown by `list`
        index: usize,
        /// New text
        text: String,
    },
    /// Delete every completed entry
    ClearCompleted,
    /// Show backend, identity and list status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, backend, rpc_url, contract_address, account,
        /// poll_interval_ms, local_finality_ms, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Commands that don't need a backend
    if let Some(Commands::Config { command }) = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, &output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    // Handle TUI (default when no command given)
    let Some(command) = cli.command else {
        return tui::run(config).await;
    };

    init_cli_logging();

    match command {
        Commands::Tui => tui::run(config).await,
        Commands::List => commands::items::list(&config, &output).await,
        Commands::Add { text } => commands::items::add(&config, &text, &output).await,
        Commands::Toggle { index } => commands::items::toggle(&config, index, &output).await,
        Commands::Delete { index } => commands::items::delete(&config, index, &output).await,
        Commands::Edit { index, text } => {
            commands::items::edit(&config, index, &text, &output).await
        }
        Commands::ClearCompleted => commands::items::clear_completed(&config, &output).await,
        Commands::Status => commands::status::show(&config, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Log to stderr for one-shot commands
///
/// Only initializes if CHAINLIST_LOG is set (e.g. `CHAINLIST_LOG=debug`).
fn init_cli_logging() {
    let Ok(log_level) = std::env::var("CHAINLIST_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!(
        "chainlist_core={},chainlist_cli={}",
        log_level, log_level
    ));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
