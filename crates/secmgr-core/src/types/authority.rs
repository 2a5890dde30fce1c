//! Authority identifiers naming the source of an authentication fact.

use std::fmt;

use serde::{Deserialize, Serialize};

const GROUP_PREFIX: &str = "urn:secmgr:group:";
const MECHANISM_PREFIX: &str = "urn:secmgr:mechanism:";

/// Opaque identifier for the producer of a cookie, credential, or verification.
///
/// Every configured credential group and mechanism owns exactly one
/// authority, derived from its name. Authorities from outside the
/// configuration (e.g. imported from an identity provider) are accepted
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authority(String);

impl Authority {
    /// Create an authority from an arbitrary URI-like string.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// The authority owned by the credential group with the given name.
    pub fn for_group(name: &str) -> Self {
        Self(format!("{GROUP_PREFIX}{name}"))
    }

    /// The authority owned by the mechanism with the given name.
    pub fn for_mechanism(name: &str) -> Self {
        Self(format!("{MECHANISM_PREFIX}{name}"))
    }

    /// Return the authority as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Authority {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
