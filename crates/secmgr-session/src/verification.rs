//! Verification outcomes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::Credential;

/// Outcome of checking a set of credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// The credentials were confirmed.
    Verified,
    /// The credentials were rejected.
    Refuted,
    /// No conclusion could be reached.
    Indeterminate,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verified => write!(f, "VERIFIED"),
            Self::Refuted => write!(f, "REFUTED"),
            Self::Indeterminate => write!(f, "INDETERMINATE"),
        }
    }
}

/// When a verification stops being trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expiration {
    /// Trusted for the life of the session.
    Never,
    /// Trusted until (exclusive) the given instant.
    At {
        /// Expiry instant.
        #[serde(with = "chrono::serde::ts_milliseconds")]
        time: DateTime<Utc>,
    },
}

impl Expiration {
    /// Expires at the given instant.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self::At { time }
    }

    /// Expired once the expiry instant is at or before `time`.
    pub fn has_expired(&self, time: DateTime<Utc>) -> bool {
        match self {
            Self::Never => false,
            Self::At { time: expires } => *expires <= time,
        }
    }
}

/// An immutable outcome tying a credential set to a status and expiration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Verification {
    /// The outcome.
    pub status: VerificationStatus,
    /// The credentials the outcome applies to.
    #[serde(default)]
    pub credentials: BTreeSet<Credential>,
    /// When the outcome stops being trusted.
    pub expiration: Expiration,
}

impl Verification {
    /// Creates a verification.
    pub fn new(
        status: VerificationStatus,
        expiration: Expiration,
        credentials: impl IntoIterator<Item = Credential>,
    ) -> Self {
        Self {
            status,
            credentials: credentials.into_iter().collect(),
            expiration,
        }
    }

    /// A positive outcome for the given credentials.
    pub fn verified(expiration: Expiration, credentials: impl IntoIterator<Item = Credential>) -> Self {
        Self::new(VerificationStatus::Verified, expiration, credentials)
    }

    /// A negative outcome for the given credentials.
    pub fn refuted(expiration: Expiration, credentials: impl IntoIterator<Item = Credential>) -> Self {
        Self::new(VerificationStatus::Refuted, expiration, credentials)
    }

    /// An inconclusive outcome with no credentials that never expires.
    pub fn indeterminate() -> Self {
        Self::new(VerificationStatus::Indeterminate, Expiration::Never, [])
    }

    /// Whether the outcome is positive.
    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }

    /// Whether the outcome is negative.
    pub fn is_refuted(&self) -> bool {
        self.status == VerificationStatus::Refuted
    }

    /// Whether the verification is no longer trusted at `time`.
    pub fn has_expired(&self, time: DateTime<Utc>) -> bool {
        self.expiration.has_expired(time)
    }

    /// Whether any of the given credentials is part of this verification.
    pub fn references_any<'a>(&self, credentials: impl IntoIterator<Item = &'a Credential>) -> bool {
        credentials.into_iter().any(|c| self.credentials.contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiration_boundary_is_inclusive() {
        let at = DateTime::from_timestamp_millis(5_000).unwrap();
        let v = Verification::verified(Expiration::at(at), [Credential::principal("alice")]);
        assert!(!v.has_expired(at - chrono::Duration::milliseconds(1)));
        assert!(v.has_expired(at));
        assert!(!Expiration::Never.has_expired(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_references_any() {
        let alice = Credential::principal("alice");
        let v = Verification::verified(Expiration::Never, [alice.clone()]);
        assert!(v.references_any([&alice]));
        assert!(!v.references_any([&Credential::principal("bob")]));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(VerificationStatus::Indeterminate).unwrap(),
            serde_json::json!("INDETERMINATE")
        );
    }
}
