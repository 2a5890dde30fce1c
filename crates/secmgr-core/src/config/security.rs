//! Credential group and authentication mechanism configuration.
//!
//! The order of credential groups (and of mechanisms within a group) is
//! significant: it is the order in which views are scanned when choosing
//! the primary verified identity.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::Authority;

/// Name of the credential group used when none is configured explicitly.
pub const DEFAULT_GROUP_NAME: &str = "Default";

/// Ordered credential groups plus the designation of the default group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityManagerConfig {
    /// Name of the default credential group.
    #[serde(default = "default_group_name")]
    pub default_group: String,
    /// Credential groups in configured order.
    #[serde(default)]
    pub credential_groups: Vec<CredentialGroup>,
}

/// A configured cluster of mechanisms sharing satisfaction rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialGroup {
    /// Unique group name.
    pub name: String,
    /// Human-readable name shown on the universal login form.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Whether a verified username is required to satisfy the group.
    #[serde(default)]
    pub requires_username: bool,
    /// Whether a verified password is required to satisfy the group.
    #[serde(default)]
    pub requires_password: bool,
    /// Whether the user may skip this group by leaving its fields empty.
    #[serde(default)]
    pub is_optional: bool,
    /// Mechanisms belonging to this group, in configured order.
    #[serde(default)]
    pub mechanisms: Vec<AuthnMechanism>,
}

/// One configured method of gathering or verifying credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnMechanism {
    /// Unique mechanism name.
    pub name: String,
    /// What kind of mechanism this is.
    pub kind: MechanismKind,
    /// Connector instance name; required for connector mechanisms.
    #[serde(default)]
    pub connector_name: Option<String>,
}

/// Kinds of authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MechanismKind {
    /// HTTP basic authentication against a sample URL.
    Basic,
    /// Authentication delegated to a connector instance.
    Connector,
    /// Cookie-based form authentication.
    Form,
    /// Kerberos / SPNEGO.
    Kerberos,
    /// LDAP bind.
    Ldap,
    /// SAML identity provider.
    Saml,
    /// Client certificate.
    Client,
    /// Group lookup only; never verifies identity.
    Groups,
}

impl std::fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Basic => "basic",
            Self::Connector => "connector",
            Self::Form => "form",
            Self::Kerberos => "kerberos",
            Self::Ldap => "ldap",
            Self::Saml => "saml",
            Self::Client => "client",
            Self::Groups => "groups",
        };
        f.write_str(name)
    }
}

impl AuthnMechanism {
    /// Creates a mechanism with no connector name.
    pub fn new(name: impl Into<String>, kind: MechanismKind) -> Self {
        Self {
            name: name.into(),
            kind,
            connector_name: None,
        }
    }

    /// The authority owned by this mechanism.
    pub fn authority(&self) -> Authority {
        Authority::for_mechanism(&self.name)
    }
}

impl CredentialGroup {
    /// Creates a group with no mechanisms and no requirements.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            requires_username: false,
            requires_password: false,
            is_optional: false,
            mechanisms: Vec::new(),
        }
    }

    /// Adds a mechanism to the end of this group.
    pub fn with_mechanism(mut self, mechanism: AuthnMechanism) -> Self {
        self.mechanisms.push(mechanism);
        self
    }

    /// The authority owned by this group.
    pub fn authority(&self) -> Authority {
        Authority::for_group(&self.name)
    }

    /// Whether any mechanism is configured for this group.
    pub fn has_mechanisms(&self) -> bool {
        !self.mechanisms.is_empty()
    }

    /// Whether the authority belongs to this group: either the group's own
    /// authority or that of one of its mechanisms.
    pub fn owns(&self, authority: &Authority) -> bool {
        *authority == self.authority() || self.mechanisms.iter().any(|m| m.authority() == *authority)
    }

    /// The group's own authority followed by every mechanism authority.
    pub fn member_authorities(&self) -> Vec<Authority> {
        std::iter::once(self.authority())
            .chain(self.mechanisms.iter().map(AuthnMechanism::authority))
            .collect()
    }

    /// Display name, falling back to the group name.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

impl Default for SecurityManagerConfig {
    fn default() -> Self {
        Self {
            default_group: default_group_name(),
            credential_groups: Vec::new(),
        }
    }
}

impl SecurityManagerConfig {
    /// Creates a configuration whose default group is [`DEFAULT_GROUP_NAME`].
    pub fn new(credential_groups: Vec<CredentialGroup>) -> Self {
        Self {
            default_group: default_group_name(),
            credential_groups,
        }
    }

    /// Credential groups in configured order.
    pub fn credential_groups(&self) -> &[CredentialGroup] {
        &self.credential_groups
    }

    /// Whether the given group is the configured default group.
    pub fn is_default(&self, group: &CredentialGroup) -> bool {
        group.name == self.default_group
    }

    /// Looks up a credential group by name.
    pub fn credential_group(&self, name: &str) -> Option<&CredentialGroup> {
        self.credential_groups.iter().find(|g| g.name == name)
    }

    /// Looks up a mechanism by name.
    pub fn mechanism(&self, name: &str) -> Option<&AuthnMechanism> {
        self.mechanisms().find(|m| m.name == name)
    }

    /// All mechanisms across all groups, in configured order.
    pub fn mechanisms(&self) -> impl Iterator<Item = &AuthnMechanism> {
        self.credential_groups.iter().flat_map(|g| g.mechanisms.iter())
    }

    /// The credential group owning the named mechanism.
    pub fn group_of_mechanism(&self, mechanism_name: &str) -> Option<&CredentialGroup> {
        self.credential_groups
            .iter()
            .find(|g| g.mechanisms.iter().any(|m| m.name == mechanism_name))
    }

    /// Resolves any authority (group or mechanism) to its credential group.
    pub fn credential_group_for(&self, authority: &Authority) -> Option<&CredentialGroup> {
        self.credential_groups.iter().find(|g| g.owns(authority))
    }

    /// Resolves a mechanism authority to its mechanism.
    pub fn mechanism_for(&self, authority: &Authority) -> Option<&AuthnMechanism> {
        self.mechanisms().find(|m| m.authority() == *authority)
    }

    /// Checks structural consistency of the configuration.
    pub fn validate(&self) -> AppResult<()> {
        let mut group_names = HashSet::new();
        let mut mechanism_names = HashSet::new();

        for group in &self.credential_groups {
            if group.name.is_empty() {
                return Err(AppError::configuration("Credential group name must not be empty"));
            }
            if !group_names.insert(group.name.as_str()) {
                return Err(AppError::configuration(format!(
                    "Duplicate credential group '{}'",
                    group.name
                )));
            }
            for mechanism in &group.mechanisms {
                if !mechanism_names.insert(mechanism.name.as_str()) {
                    return Err(AppError::configuration(format!(
                        "Mechanism '{}' is configured more than once",
                        mechanism.name
                    )));
                }
                if mechanism.kind == MechanismKind::Connector
                    && mechanism.connector_name.as_deref().unwrap_or("").is_empty()
                {
                    return Err(AppError::configuration(format!(
                        "Connector mechanism '{}' has no connector name",
                        mechanism.name
                    )));
                }
            }
        }

        if !self.credential_groups.is_empty() && !group_names.contains(self.default_group.as_str()) {
            return Err(AppError::configuration(format!(
                "Default credential group '{}' is not configured",
                self.default_group
            )));
        }

        Ok(())
    }
}

fn default_group_name() -> String {
    DEFAULT_GROUP_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample() -> SecurityManagerConfig {
        SecurityManagerConfig::new(vec![
            CredentialGroup::new("Default")
                .with_mechanism(AuthnMechanism::new("form1", MechanismKind::Form)),
            CredentialGroup::new("ldap")
                .with_mechanism(AuthnMechanism::new("ldap1", MechanismKind::Ldap)),
        ])
    }

    #[test]
    fn test_resolves_mechanism_authority_to_group() {
        let config = sample();
        let group = config
            .credential_group_for(&Authority::for_mechanism("ldap1"))
            .expect("group");
        assert_eq!(group.name, "ldap");
        assert!(config.credential_group_for(&Authority::new("urn:other")).is_none());
    }

    #[test]
    fn test_validate_rejects_duplicate_mechanism() {
        let mut config = sample();
        config.credential_groups[1]
            .mechanisms
            .push(AuthnMechanism::new("form1", MechanismKind::Form));
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_validate_requires_connector_name() {
        let config = SecurityManagerConfig::new(vec![
            CredentialGroup::new("Default")
                .with_mechanism(AuthnMechanism::new("conn", MechanismKind::Connector)),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_default_group() {
        let mut config = sample();
        config.default_group = "missing".to_string();
        assert!(config.validate().is_err());
        assert!(SecurityManagerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_deserialize_from_json() {
        let config: SecurityManagerConfig = serde_json::from_value(serde_json::json!({
            "credential_groups": [{
                "name": "Default",
                "requires_username": true,
                "mechanisms": [{ "name": "basic1", "kind": "basic" }]
            }]
        }))
        .expect("deserialize");
        assert_eq!(config.default_group, DEFAULT_GROUP_NAME);
        assert!(config.credential_groups[0].requires_username);
        assert_eq!(config.credential_groups[0].mechanisms[0].kind, MechanismKind::Basic);
    }
}
