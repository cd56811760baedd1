//! StockChat - stock charts and commentary from the command line
//!
//! Thin front end over `StockClient`: parses arguments, runs one service
//! operation and prints the result.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stockchat::api::StockClient;
use stockchat::cli::{Action, Cli, OutputFormat, RunConfig};
use stockchat::config::ClientConfig;
use stockchat::data::ApiResponse;
use stockchat::render::{render_error, render_report};

/// Sends log output to stderr so stdout stays clean for reports and JSON
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Prints a response in the requested format
fn print_response(response: &ApiResponse, output: OutputFormat) -> Result<(), serde_json::Error> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(response)?),
        OutputFormat::Report => print!("{}", render_report(response)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let base = match ClientConfig::from_env() {
        Ok(base) => base,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = match RunConfig::from_cli(&cli, base) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.log_level);
    tracing::debug!(api_base = %config.client.api_base, action = ?config.action, "starting");

    let client = StockClient::new(&config.client);

    let result = match &config.action {
        Action::Latest => client.fetch_initial_stock().await,
        Action::Ask(message) => client.analyze_stock(message).await,
        Action::Share(id) => client.fetch_shared_analysis(id).await,
        Action::ClearCache => {
            return match client.clear_cache() {
                Ok(()) => {
                    println!("Cache cleared");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    ExitCode::FAILURE
                }
            };
        }
    };

    match result {
        Ok(response) => match print_response(&response, config.output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("{}", render_error(&e));
            ExitCode::FAILURE
        }
    }
}
