//! Inspector command definitions and dispatch.

pub mod exported;
pub mod state;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use secmgr_core::config::AppConfig;
use secmgr_core::error::{AppError, ErrorKind};
use secmgr_core::result::AppResult;
use secmgr_core::traits::{Clock, SystemClock};
use secmgr_core::types::SessionId;
use secmgr_session::{AuthnSessionState, Expiration, SessionSnapshot, SessionView};

use crate::output::{self, OutputFormat};

/// Security manager session inspector
#[derive(Debug, Parser)]
#[command(name = "secmgr-inspect", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/secmgr.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Evaluate expirations at this RFC 3339 instant instead of now
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a serialized session state
    State(state::StateArgs),
    /// Inspect an exported state
    Exported(exported::ExportedArgs),
}

impl Cli {
    /// Execute the command
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.command {
            Commands::State(args) => state::execute(args, config, self.time(), self.format),
            Commands::Exported(args) => exported::execute(args, config, self.at, self.format),
        }
    }

    fn time(&self) -> DateTime<Utc> {
        self.at.unwrap_or_else(|| SystemClock.now())
    }
}

/// One row per view of a snapshot
#[derive(Debug, Serialize, Tabled)]
pub struct ViewRow {
    /// View name
    view: String,
    /// Group, mechanism kind, or session
    kind: String,
    /// Verification status
    status: String,
    /// Satisfied
    satisfied: String,
    /// Verified principal
    principal: String,
    /// Earliest verification expiry
    expires: String,
}

impl ViewRow {
    fn new(name: &str, kind: &str, view: &SessionView) -> Self {
        let expires = match view.expiration() {
            Some(Expiration::At { time }) => time.to_rfc3339(),
            Some(Expiration::Never) => "never".to_string(),
            None => "-".to_string(),
        };
        Self {
            view: name.to_string(),
            kind: kind.to_string(),
            status: view.verification_status().to_string(),
            satisfied: output::mark(view.is_satisfied()),
            principal: output::or_dash(view.username().as_deref()),
            expires,
        }
    }
}

/// Helper: read a JSON file
pub fn read_file(path: &Path) -> AppResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        let message = format!("Failed to read '{}': {}", path.display(), e);
        AppError::with_source(ErrorKind::Io, message, e)
    })
}

/// Helper: freeze a state against the configured credential groups
pub fn snapshot_at(
    config: &AppConfig,
    state: AuthnSessionState,
    time: DateTime<Utc>,
) -> SessionSnapshot {
    SessionSnapshot::builder(
        SessionId::new(),
        Arc::new(config.security.clone()),
        state,
        time,
    )
    .build()
}

/// Helper: rows for the unspecialized view followed by every credential
/// group and its mechanisms, in configured order
pub fn view_rows(snapshot: &SessionSnapshot) -> AppResult<Vec<ViewRow>> {
    let mut rows = vec![ViewRow::new("session", "session", &snapshot.view())];
    let config = Arc::clone(snapshot.config());
    for group in config.credential_groups() {
        let view = snapshot.view_for_credential_group(group)?;
        rows.push(ViewRow::new(group.display_name(), "group", &view));
        for mechanism in &group.mechanisms {
            let view = snapshot.view_for_mechanism(mechanism)?;
            rows.push(ViewRow::new(
                &format!("  {}", mechanism.name),
                &mechanism.kind.to_string(),
                &view,
            ));
        }
    }
    Ok(rows)
}
