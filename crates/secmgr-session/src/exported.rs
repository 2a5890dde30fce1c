//! Flattened credential bundle handed to the search appliance.
//!
//! Identity providers may produce the same structure, so deserialization
//! validates it as strictly as construction does.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use secmgr_core::config::MechanismKind;
use secmgr_core::error::AppError;
use secmgr_core::result::AppResult;

use crate::cookie::Cookie;
use crate::credential::Group;
use crate::snapshot::SessionSnapshot;
use crate::state::AuthnSessionState;
use crate::view::SessionView;

/// Lowest supported format version.
pub const MIN_VERSION: i32 = 1;
/// Highest supported format version.
pub const MAX_VERSION: i32 = 1;
/// Version written by this crate.
pub const CURRENT_VERSION: i32 = 1;

/// Identity extracted from one view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: Option<String>,
    pub domain: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub groups: BTreeSet<Group>,
}

impl Credentials {
    /// The verified identity of a view.
    pub fn from_view(view: &SessionView) -> Self {
        Self {
            username: view.username(),
            domain: view.domain(),
            password: view.password(),
            groups: view.verified_groups(),
        }
    }

    /// Whether no field is populated.
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.domain.is_none()
            && self.password.is_none()
            && self.groups.is_empty()
    }
}

/// Serializable summary of a session for external consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawExportedState")]
pub struct ExportedState {
    version: i32,
    time_stamp: i64,
    session_state: AuthnSessionState,
    pvi_credentials: Credentials,
    basic_credentials: Credentials,
    connector_credentials: BTreeMap<String, Credentials>,
    cookies: Vec<Cookie>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExportedState {
    version: i32,
    time_stamp: i64,
    #[serde(default)]
    session_state: AuthnSessionState,
    #[serde(default)]
    pvi_credentials: Credentials,
    #[serde(default)]
    basic_credentials: Credentials,
    #[serde(default)]
    connector_credentials: BTreeMap<String, Credentials>,
    #[serde(default)]
    cookies: Vec<Cookie>,
}

impl TryFrom<RawExportedState> for ExportedState {
    type Error = AppError;

    fn try_from(raw: RawExportedState) -> Result<Self, Self::Error> {
        Self::new(
            raw.version,
            raw.time_stamp,
            raw.session_state,
            raw.pvi_credentials,
            raw.basic_credentials,
            raw.connector_credentials,
            raw.cookies,
        )
    }
}

impl ExportedState {
    /// Creates an exported state, validating the version and time stamp.
    pub fn new(
        version: i32,
        time_stamp: i64,
        session_state: AuthnSessionState,
        pvi_credentials: Credentials,
        basic_credentials: Credentials,
        connector_credentials: BTreeMap<String, Credentials>,
        cookies: Vec<Cookie>,
    ) -> AppResult<Self> {
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(AppError::validation(format!(
                "Exported state version {version} is outside [{MIN_VERSION}, {MAX_VERSION}]"
            )));
        }
        if time_stamp < 0 {
            return Err(AppError::validation(format!(
                "Exported state time stamp {time_stamp} is negative"
            )));
        }
        Ok(Self {
            version,
            time_stamp,
            session_state,
            pvi_credentials,
            basic_credentials,
            connector_credentials,
            cookies,
        })
    }

    /// Flattens a snapshot.
    ///
    /// The primary verified identity comes from [`SessionSnapshot::primary_verified_view`];
    /// basic and connector identities come from the first verified basic
    /// mechanism and from each verified connector mechanism respectively.
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> AppResult<Self> {
        let pvi_credentials = snapshot
            .primary_verified_view()
            .map(|view| Credentials::from_view(&view))
            .unwrap_or_default();

        let mut basic_credentials = Credentials::default();
        let mut connector_credentials = BTreeMap::new();
        for mechanism in snapshot.config().mechanisms() {
            match mechanism.kind {
                MechanismKind::Basic if basic_credentials.is_empty() => {
                    let view = snapshot.view_for_mechanism(mechanism)?;
                    if view.has_verified_principal() {
                        basic_credentials = Credentials::from_view(&view);
                    }
                }
                MechanismKind::Connector => {
                    let view = snapshot.view_for_mechanism(mechanism)?;
                    let Some(name) = &mechanism.connector_name else {
                        continue;
                    };
                    if view.has_verified_principal() {
                        connector_credentials.insert(name.clone(), Credentials::from_view(&view));
                    }
                }
                _ => {}
            }
        }

        let mut cookies = snapshot.view().cookies();
        cookies.extend(snapshot.user_agent_cookies().iter().cloned());
        cookies.sort();
        cookies.dedup();

        debug!(
            session_id = %snapshot.session_id(),
            connectors = connector_credentials.len(),
            cookies = cookies.len(),
            "Exported session state"
        );

        Self::new(
            CURRENT_VERSION,
            snapshot.time_stamp().timestamp_millis(),
            snapshot.state().clone(),
            pvi_credentials,
            basic_credentials,
            connector_credentials,
            cookies,
        )
    }

    /// Parses and validates the JSON form.
    pub fn from_json(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Renders the JSON form.
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Milliseconds since the Unix epoch.
    pub fn time_stamp(&self) -> i64 {
        self.time_stamp
    }

    /// The time stamp as a date-time.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.time_stamp)
    }

    pub fn session_state(&self) -> &AuthnSessionState {
        &self.session_state
    }

    pub fn pvi_credentials(&self) -> &Credentials {
        &self.pvi_credentials
    }

    pub fn basic_credentials(&self) -> &Credentials {
        &self.basic_credentials
    }

    pub fn connector_credentials(&self) -> &BTreeMap<String, Credentials> {
        &self.connector_credentials
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use secmgr_core::config::SecurityManagerConfig;
    use secmgr_core::error::ErrorKind;
    use secmgr_core::types::SessionId;

    fn empty_with_version(version: i32) -> AppResult<ExportedState> {
        ExportedState::new(
            version,
            0,
            AuthnSessionState::empty(),
            Credentials::default(),
            Credentials::default(),
            BTreeMap::new(),
            Vec::new(),
        )
    }

    #[test]
    fn test_version_range_is_enforced() {
        assert!(empty_with_version(1).is_ok());
        for bad in [0, 2, -1] {
            let err = empty_with_version(bad).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
        }
    }

    #[test]
    fn test_pre_epoch_snapshot_is_rejected() {
        let before_epoch = DateTime::from_timestamp_millis(-1_000).unwrap();
        let snapshot = SessionSnapshot::builder(
            SessionId::new(),
            Arc::new(SecurityManagerConfig::default()),
            AuthnSessionState::empty(),
            before_epoch,
        )
        .build();

        let err = ExportedState::from_snapshot(&snapshot).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_deserialization_rejects_bad_version() {
        let json = r#"{"version": 2, "timeStamp": 5}"#;
        assert!(ExportedState::from_json(json).is_err());
        let json = r#"{"version": 1, "timeStamp": -5}"#;
        assert!(ExportedState::from_json(json).is_err());
    }

    #[test]
    fn test_missing_groups_default_to_empty() {
        let json = r#"{
            "version": 1,
            "timeStamp": 1700000000000,
            "pviCredentials": {"username": "alice", "domain": null, "password": null}
        }"#;
        let state = ExportedState::from_json(json).expect("valid");
        assert_eq!(state.pvi_credentials().username.as_deref(), Some("alice"));
        assert!(state.pvi_credentials().groups.is_empty());
        assert!(state.basic_credentials().is_empty());
        assert!(state.session_state().is_empty());
    }

    #[test]
    fn test_json_field_names() {
        let state = empty_with_version(1).unwrap();
        let json: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
        for field in [
            "version",
            "timeStamp",
            "sessionState",
            "pviCredentials",
            "basicCredentials",
            "connectorCredentials",
            "cookies",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["pviCredentials"]["groups"], serde_json::json!([]));
    }
}
