//! Command-line interface parsing for StockChat
//!
//! This module handles parsing of CLI arguments using clap and turns them,
//! together with the environment-derived client configuration, into a
//! `RunConfig` describing what the binary should do.

use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::ClientConfig;

/// Error types for CLI argument handling
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// Timeout of zero seconds
    #[error("Invalid timeout: '{0}'. Timeout must be at least 1 second")]
    InvalidTimeout(u64),

    /// The question for `ask` was empty after joining its words
    #[error("Nothing to analyze: the message is empty")]
    EmptyMessage,
}

/// StockChat - stock analysis from the command line
#[derive(Parser, Debug)]
#[command(name = "stockchat")]
#[command(about = "Stock charts and commentary from the StockChat analysis service")]
#[command(version)]
pub struct Cli {
    /// Service root, e.g. http://localhost:8000/api/v1 (overrides STOCKCHAT_API_BASE)
    #[arg(long, value_name = "URL", global = true)]
    pub api_base: Option<String>,

    /// Per-request timeout in seconds (overrides STOCKCHAT_TIMEOUT_SECS)
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Keep cached responses in memory only for this run
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Print the raw JSON response instead of a report
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output on stderr (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What to ask the service for
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the default series and commentary (the default)
    Latest,
    /// Submit a question for fresh analysis
    ///
    /// Examples:
    ///   stockchat ask How is AAPL doing?
    ///   stockchat ask "Compare NVDA's momentum to last quarter"
    Ask {
        /// The question; multiple words are joined with spaces
        #[arg(required = true, num_args = 1.., value_name = "MESSAGE")]
        message: Vec<String>,
    },
    /// Show a previously shared analysis
    Share {
        /// Share id printed by `ask`
        id: String,
    },
    /// Delete all cached responses
    ClearCache,
}

/// Resolved action for the binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Latest,
    Ask(String),
    Share(String),
    ClearCache,
}

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Report,
    Json,
}

/// Everything the binary needs to run, derived from CLI arguments
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Client settings after CLI overrides
    pub client: ClientConfig,
    /// What to do
    pub action: Action,
    /// How to print the result
    pub output: OutputFormat,
    /// Default log filter when RUST_LOG is unset
    pub log_level: &'static str,
}

impl RunConfig {
    /// Creates a RunConfig from parsed CLI arguments layered over `base`.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    /// * `base` - Client configuration from defaults and environment
    ///
    /// # Returns
    /// * `Ok(RunConfig)` with CLI overrides applied
    /// * `Err(CliError)` if an argument is unusable
    pub fn from_cli(cli: &Cli, base: ClientConfig) -> Result<Self, CliError> {
        let mut client = base;

        if let Some(api_base) = &cli.api_base {
            client = client.with_api_base(api_base.clone());
        }
        if let Some(secs) = cli.timeout {
            if secs == 0 {
                return Err(CliError::InvalidTimeout(secs));
            }
            client = client.with_timeout(Duration::from_secs(secs));
        }
        if cli.no_cache {
            client = client.with_cache_dir(None);
        }

        let action = match &cli.command {
            None | Some(Command::Latest) => Action::Latest,
            Some(Command::Ask { message }) => {
                let message = message.join(" ");
                if message.trim().is_empty() {
                    return Err(CliError::EmptyMessage);
                }
                Action::Ask(message)
            }
            Some(Command::Share { id }) => Action::Share(id.clone()),
            Some(Command::ClearCache) => Action::ClearCache,
        };

        let output = if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Report
        };

        let log_level = match cli.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };

        Ok(RunConfig {
            client,
            action,
            output,
            log_level,
        })
    }
}
