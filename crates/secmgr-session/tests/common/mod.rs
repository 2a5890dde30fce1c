//! Shared fixtures for session engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use secmgr_core::config::{AuthnMechanism, CredentialGroup, MechanismKind, SecurityManagerConfig};
use secmgr_core::types::{Authority, SessionId};
use secmgr_session::{AuthnSessionState, Credential, Expiration, SessionSnapshot, Verification};

/// Fixed instant all snapshots are taken at.
pub fn now() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

/// Expires one hour after [`now`].
pub fn in_an_hour() -> Expiration {
    Expiration::at(now() + Duration::hours(1))
}

/// Default group with a form and a basic mechanism; "ldap" group with one
/// ldap mechanism; "dept" group with a connector mechanism.
pub fn config() -> Arc<SecurityManagerConfig> {
    let mut connector = AuthnMechanism::new("conn1", MechanismKind::Connector);
    connector.connector_name = Some("sharepoint".to_string());

    Arc::new(SecurityManagerConfig::new(vec![
        CredentialGroup::new("Default")
            .with_mechanism(AuthnMechanism::new("form1", MechanismKind::Form))
            .with_mechanism(AuthnMechanism::new("basic1", MechanismKind::Basic)),
        CredentialGroup::new("ldap")
            .with_mechanism(AuthnMechanism::new("ldap1", MechanismKind::Ldap)),
        CredentialGroup::new("dept").with_mechanism(connector),
    ]))
}

pub fn mech(name: &str) -> Authority {
    Authority::for_mechanism(name)
}

pub fn verified(credentials: impl IntoIterator<Item = Credential>) -> Verification {
    Verification::verified(in_an_hour(), credentials)
}

pub fn snapshot(
    config: Arc<SecurityManagerConfig>,
    state: AuthnSessionState,
) -> SessionSnapshot {
    SessionSnapshot::builder(SessionId::new(), config, state, now()).build()
}
