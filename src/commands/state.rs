//! Replay a serialized session state.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;

use secmgr_core::config::AppConfig;
use secmgr_core::error::AppError;
use secmgr_core::result::AppResult;
use secmgr_session::AuthnSessionState;

use crate::output::{self, OutputFormat};

/// Arguments for the state command
#[derive(Debug, Args)]
pub struct StateArgs {
    /// JSON file holding an instruction array
    pub file: PathBuf,
}

/// Execute the state command
pub fn execute(
    args: &StateArgs,
    config: &AppConfig,
    time: DateTime<Utc>,
    format: OutputFormat,
) -> AppResult<()> {
    let json = super::read_file(&args.file)?;
    let state: AuthnSessionState = serde_json::from_str(&json)
        .map_err(|e| AppError::validation(format!("Invalid session state: {}", e)))?;
    tracing::info!(instructions = state.len(), "Replaying session state");

    let snapshot = super::snapshot_at(config, state, time);
    let rows = super::view_rows(&snapshot)?;

    if format == OutputFormat::Table {
        output::print_kv("Instructions", &snapshot.state().len().to_string());
        output::print_kv("Evaluated at", &time.to_rfc3339());
        println!();
    }
    output::print_list(&rows, format);
    Ok(())
}
