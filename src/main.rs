//! Security manager session inspector.
//!
//! Replays a serialized authentication session state (or an exported state)
//! against a credential group configuration and reports what each credential
//! group and mechanism would see.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use secmgr_core::config::{AppConfig, LoggingConfig};

mod commands;
mod output;

use commands::Cli;

fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);
    tracing::debug!(
        config = %cli.config,
        groups = config.security.credential_groups().len(),
        "Loaded configuration"
    );

    if let Err(e) = cli.execute(&config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging. Log lines go to stderr so that JSON output
/// on stdout stays parseable.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
