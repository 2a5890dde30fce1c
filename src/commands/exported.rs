//! Inspect an exported state.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use secmgr_core::config::AppConfig;
use secmgr_core::error::AppError;
use secmgr_core::result::AppResult;
use secmgr_session::{Credentials, ExportedState};

use super::ViewRow;
use crate::output::{self, OutputFormat};

/// Arguments for the exported command
#[derive(Debug, Args)]
pub struct ExportedArgs {
    /// JSON file holding an exported state
    pub file: PathBuf,
}

/// Identity display row
#[derive(Debug, Serialize, Tabled)]
struct IdentityRow {
    /// Where the identity came from
    source: String,
    /// Username
    username: String,
    /// Domain
    domain: String,
    /// Password present
    password: String,
    /// Group names
    groups: String,
}

impl IdentityRow {
    fn new(source: &str, credentials: &Credentials) -> Self {
        let groups: Vec<&str> = credentials.groups.iter().map(|g| g.name.as_str()).collect();
        Self {
            source: source.to_string(),
            username: output::or_dash(credentials.username.as_deref()),
            domain: output::or_dash(credentials.domain.as_deref()),
            password: output::mark(credentials.password.is_some()),
            groups: if groups.is_empty() {
                "-".to_string()
            } else {
                groups.join(", ")
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportedReport {
    version: i32,
    time_stamp: i64,
    identities: Vec<IdentityRow>,
    views: Vec<ViewRow>,
}

/// Execute the exported command
///
/// Views are evaluated at `at` when given, otherwise at the exported time
/// stamp.
pub fn execute(
    args: &ExportedArgs,
    config: &AppConfig,
    at: Option<DateTime<Utc>>,
    format: OutputFormat,
) -> AppResult<()> {
    let json = super::read_file(&args.file)?;
    let exported = ExportedState::from_json(&json)?;

    let time = at
        .or_else(|| exported.time())
        .ok_or_else(|| AppError::validation("Exported time stamp is out of range"))?;

    let mut identities = vec![
        IdentityRow::new("pvi", exported.pvi_credentials()),
        IdentityRow::new("basic", exported.basic_credentials()),
    ];
    for (connector, credentials) in exported.connector_credentials() {
        identities.push(IdentityRow::new(
            &format!("connector:{connector}"),
            credentials,
        ));
    }

    let snapshot = super::snapshot_at(config, exported.session_state().clone(), time);
    let views = super::view_rows(&snapshot)?;

    match format {
        OutputFormat::Table => {
            output::print_kv("Version", &exported.version().to_string());
            output::print_kv("Time stamp", &time.to_rfc3339());
            output::print_kv("Cookies", &exported.cookies().len().to_string());
            output::print_kv("Instructions", &exported.session_state().len().to_string());
            println!();
            output::print_list(&identities, format);
            println!();
            output::print_list(&views, format);
        }
        OutputFormat::Json => {
            let report = ExportedReport {
                version: exported.version(),
                time_stamp: exported.time_stamp(),
                identities,
                views,
            };
            output::print_item(&report, format);
        }
    }
    Ok(())
}
