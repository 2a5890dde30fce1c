//! Credential value types.
//!
//! Credentials are opaque, immutable facts about an identity. Each variant
//! of [`Credential`] is a distinct "type" for uniqueness queries: a session
//! may hold at most one meaningful principal, one password, and one set of
//! group memberships per authority scope. When two different values of the
//! same kind are visible, the kind resolves to absent rather than to either
//! value.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The variant tag of a [`Credential`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// A user identity.
    Principal,
    /// A password.
    Password,
    /// A set of group memberships.
    GroupMemberships,
}

/// A group the user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Namespace the group name is resolved in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Windows domain of the group, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Group {
    /// Creates a group with no namespace or domain.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            domain: None,
        }
    }
}

/// A typed fact about identity.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// The user's name, optionally qualified by a domain.
    Principal {
        /// User name; empty when the user left the field blank.
        name: String,
        /// Windows domain, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        domain: Option<String>,
    },
    /// The user's password.
    Password {
        /// Password text; empty when the user left the field blank.
        text: String,
    },
    /// Groups the user belongs to.
    GroupMemberships {
        /// The group set.
        #[serde(default)]
        groups: BTreeSet<Group>,
    },
}

impl Credential {
    /// Creates a principal with no domain.
    pub fn principal(name: impl Into<String>) -> Self {
        Self::Principal {
            name: name.into(),
            domain: None,
        }
    }

    /// Creates a principal qualified by a domain.
    pub fn principal_in_domain(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self::Principal {
            name: name.into(),
            domain: Some(domain.into()),
        }
    }

    /// Creates a password credential.
    pub fn password(text: impl Into<String>) -> Self {
        Self::Password { text: text.into() }
    }

    /// Creates a group memberships credential.
    pub fn group_memberships(groups: impl IntoIterator<Item = Group>) -> Self {
        Self::GroupMemberships {
            groups: groups.into_iter().collect(),
        }
    }

    /// The variant tag of this credential.
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::Principal { .. } => CredentialKind::Principal,
            Self::Password { .. } => CredentialKind::Password,
            Self::GroupMemberships { .. } => CredentialKind::GroupMemberships,
        }
    }

    /// Whether this credential is of the given kind.
    pub fn is_kind(&self, kind: CredentialKind) -> bool {
        self.kind() == kind
    }

    /// Whether the credential carries no information, i.e. a blank
    /// principal or password. Group memberships are never empty in this
    /// sense; an empty group set is still a positive statement.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Principal { name, .. } => name.is_empty(),
            Self::Password { text } => text.is_empty(),
            Self::GroupMemberships { .. } => false,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Principal { name, domain } => f
                .debug_struct("Principal")
                .field("name", name)
                .field("domain", domain)
                .finish(),
            Self::Password { .. } => f
                .debug_struct("Password")
                .field("text", &"<redacted>")
                .finish(),
            Self::GroupMemberships { groups } => f
                .debug_struct("GroupMemberships")
                .field("groups", groups)
                .finish(),
        }
    }
}

/// Finds the single credential of `kind` among `credentials`.
///
/// Equal duplicates are reconciled. Returns `None` when there is no such
/// credential or when two distinct values of the kind are present.
pub(crate) fn unique_of_kind<'a, I>(credentials: I, kind: CredentialKind) -> Option<&'a Credential>
where
    I: IntoIterator<Item = &'a Credential>,
{
    let mut found: Option<&Credential> = None;
    for credential in credentials.into_iter().filter(|c| c.is_kind(kind)) {
        match found {
            None => found = Some(credential),
            Some(existing) if existing == credential => {}
            Some(_) => return None,
        }
    }
    found
}
