//! Projections of a session snapshot.
//!
//! A [`SessionView`] interprets the snapshot's [`Summary`] through a pair of
//! authority filters: the cookie filter (which also selects verifications)
//! and the credential filter. Views come in three variants:
//!
//! - **Unspecialized**: everything in the session.
//! - **Mechanism**: the facts produced by one mechanism, plus the
//!   credentials held by its credential group.
//! - **Credential group**: the facts produced by the group and all of its
//!   mechanisms.
//!
//! Asking a view for an accessor that does not apply to its variant (the
//! mechanism of an unspecialized view, say) is a caller bug and returns an
//! [`ErrorKind::Unsupported`](secmgr_core::error::ErrorKind::Unsupported) error.

pub mod filter;

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};

use secmgr_core::config::{AuthnMechanism, CredentialGroup, SecurityManagerConfig};
use secmgr_core::error::AppError;
use secmgr_core::result::AppResult;
use secmgr_core::types::{Authority, SessionId};

use crate::cookie::Cookie;
use crate::credential::{Credential, CredentialKind, Group, unique_of_kind};
use crate::snapshot::{SnapshotData, ViewCache};
use crate::state::Summary;
use crate::verification::{Expiration, Verification, VerificationStatus};

pub use filter::AuthorityFilter;

/// Which part of the session a view is specialized for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewKind {
    /// The whole session.
    Unspecialized,
    /// One mechanism and the group that owns it.
    Mechanism {
        /// The mechanism.
        mechanism: AuthnMechanism,
        /// The mechanism's credential group.
        group: CredentialGroup,
    },
    /// One credential group.
    CredentialGroup(CredentialGroup),
}

/// A read-only projection of a snapshot.
#[derive(Debug, Clone)]
pub struct SessionView {
    snapshot: Arc<SnapshotData>,
    views: Weak<ViewCache>,
    kind: ViewKind,
    cookie_filter: AuthorityFilter,
    credential_filter: AuthorityFilter,
}

impl SessionView {
    pub(crate) fn unspecialized(snapshot: Arc<SnapshotData>, views: Weak<ViewCache>) -> Self {
        Self {
            snapshot,
            views,
            kind: ViewKind::Unspecialized,
            cookie_filter: AuthorityFilter::Any,
            credential_filter: AuthorityFilter::Any,
        }
    }

    pub(crate) fn for_mechanism(
        snapshot: Arc<SnapshotData>,
        views: Weak<ViewCache>,
        mechanism: AuthnMechanism,
        group: CredentialGroup,
    ) -> Self {
        let authority = mechanism.authority();
        Self {
            snapshot,
            views,
            cookie_filter: AuthorityFilter::Only(authority.clone()),
            credential_filter: AuthorityFilter::Only(authority),
            kind: ViewKind::Mechanism { mechanism, group },
        }
    }

    pub(crate) fn for_credential_group(
        snapshot: Arc<SnapshotData>,
        views: Weak<ViewCache>,
        group: CredentialGroup,
    ) -> Self {
        let members: BTreeSet<Authority> = group.member_authorities().into_iter().collect();
        Self {
            snapshot,
            views,
            cookie_filter: AuthorityFilter::AnyOf(members.clone()),
            credential_filter: AuthorityFilter::AnyOf(members),
            kind: ViewKind::CredentialGroup(group),
        }
    }

    // Variant accessors.

    /// The variant of this view.
    pub fn kind(&self) -> &ViewKind {
        &self.kind
    }

    pub fn is_unspecialized(&self) -> bool {
        matches!(self.kind, ViewKind::Unspecialized)
    }

    pub fn is_for_mechanism(&self) -> bool {
        matches!(self.kind, ViewKind::Mechanism { .. })
    }

    pub fn is_for_credential_group(&self) -> bool {
        matches!(self.kind, ViewKind::CredentialGroup(_))
    }

    /// The authority this view is specialized for.
    pub fn authority(&self) -> AppResult<Authority> {
        match &self.kind {
            ViewKind::Unspecialized => Err(AppError::unsupported(
                "An unspecialized view has no authority",
            )),
            ViewKind::Mechanism { mechanism, .. } => Ok(mechanism.authority()),
            ViewKind::CredentialGroup(group) => Ok(group.authority()),
        }
    }

    /// The mechanism of a mechanism view.
    pub fn mechanism(&self) -> AppResult<&AuthnMechanism> {
        match &self.kind {
            ViewKind::Mechanism { mechanism, .. } => Ok(mechanism),
            _ => Err(AppError::unsupported(
                "Only a mechanism view has a mechanism",
            )),
        }
    }

    /// The credential group of a mechanism or credential-group view.
    pub fn credential_group(&self) -> AppResult<&CredentialGroup> {
        match &self.kind {
            ViewKind::Unspecialized => Err(AppError::unsupported(
                "An unspecialized view has no credential group",
            )),
            ViewKind::Mechanism { group, .. } => Ok(group),
            ViewKind::CredentialGroup(group) => Ok(group),
        }
    }

    /// Selects cookies and verifications.
    pub fn cookie_filter(&self) -> &AuthorityFilter {
        &self.cookie_filter
    }

    /// Selects credentials.
    pub fn credential_filter(&self) -> &AuthorityFilter {
        &self.credential_filter
    }

    // Snapshot passthroughs.

    pub fn session_id(&self) -> SessionId {
        self.snapshot.session_id
    }

    pub fn time_stamp(&self) -> DateTime<Utc> {
        self.snapshot.time_stamp
    }

    pub fn config(&self) -> &SecurityManagerConfig {
        &self.snapshot.config
    }

    pub fn authn_entry_url(&self) -> Option<&str> {
        self.snapshot.authn_entry_url.as_deref()
    }

    pub fn user_agent_cookies(&self) -> &[Cookie] {
        &self.snapshot.user_agent_cookies
    }

    pub fn summary(&self) -> &Summary {
        self.snapshot.summary()
    }

    // Projected facts.

    /// Cookies from selected authorities, unexpired at the snapshot time.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.summary()
            .get_cookies(|a| self.cookie_filter.matches(a), Some(self.time_stamp()))
    }

    /// Credentials held by selected authorities.
    pub fn credentials(&self) -> BTreeSet<Credential> {
        self.summary()
            .get_credentials(|a| self.credential_filter.matches(a))
    }

    /// Verifications from selected authorities, unexpired at the snapshot time.
    pub fn verifications(&self) -> Vec<Verification> {
        self.summary()
            .get_verifications(|a| self.cookie_filter.matches(a), Some(self.time_stamp()))
    }

    /// Credentials appearing in unexpired verified verifications.
    pub fn verified_credentials(&self) -> BTreeSet<Credential> {
        self.verifications()
            .into_iter()
            .filter(Verification::is_verified)
            .flat_map(|v| v.credentials)
            .collect()
    }

    /// Earliest expiration among unexpired verified verifications.
    pub fn expiration(&self) -> Option<Expiration> {
        self.verifications()
            .into_iter()
            .filter(Verification::is_verified)
            .map(|v| v.expiration)
            .min_by(|a, b| match (a, b) {
                (Expiration::Never, Expiration::Never) => std::cmp::Ordering::Equal,
                (Expiration::Never, _) => std::cmp::Ordering::Greater,
                (_, Expiration::Never) => std::cmp::Ordering::Less,
                (Expiration::At { time: x }, Expiration::At { time: y }) => x.cmp(y),
            })
    }

    // Unique-credential queries. Two distinct values of a kind resolve to None.

    pub fn principal(&self) -> Option<Credential> {
        self.unique(CredentialKind::Principal)
    }

    pub fn password_credential(&self) -> Option<Credential> {
        self.unique(CredentialKind::Password)
    }

    pub fn group_memberships(&self) -> Option<Credential> {
        self.unique(CredentialKind::GroupMemberships)
    }

    pub fn verified_principal(&self) -> Option<Credential> {
        self.unique_verified(CredentialKind::Principal)
    }

    pub fn verified_password_credential(&self) -> Option<Credential> {
        self.unique_verified(CredentialKind::Password)
    }

    pub fn verified_group_memberships(&self) -> Option<Credential> {
        self.unique_verified(CredentialKind::GroupMemberships)
    }

    pub fn has_principal(&self) -> bool {
        self.principal().is_some()
    }

    pub fn has_verified_principal(&self) -> bool {
        self.verified_principal().is_some()
    }

    pub fn has_verified_password(&self) -> bool {
        self.verified_password_credential().is_some()
    }

    /// Whether the principal was explicitly supplied blank.
    pub fn has_empty_principal(&self) -> bool {
        self.principal().is_some_and(|c| c.is_empty())
    }

    /// Whether the password was explicitly supplied blank.
    pub fn has_empty_password(&self) -> bool {
        self.password_credential().is_some_and(|c| c.is_empty())
    }

    /// Name of the verified principal.
    pub fn username(&self) -> Option<String> {
        match self.verified_principal()? {
            Credential::Principal { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Domain of the verified principal.
    pub fn domain(&self) -> Option<String> {
        match self.verified_principal()? {
            Credential::Principal { domain, .. } => domain,
            _ => None,
        }
    }

    /// Text of the verified password.
    pub fn password(&self) -> Option<String> {
        match self.verified_password_credential()? {
            Credential::Password { text } => Some(text),
            _ => None,
        }
    }

    /// Groups from the verified group memberships, empty if none.
    pub fn verified_groups(&self) -> BTreeSet<Group> {
        match self.verified_group_memberships() {
            Some(Credential::GroupMemberships { groups }) => groups,
            _ => BTreeSet::new(),
        }
    }

    // Verification status.

    /// REFUTED if any verification refutes, VERIFIED if at least one
    /// verifies, INDETERMINATE otherwise.
    pub fn verification_status(&self) -> VerificationStatus {
        let verifications = self.verifications();
        if verifications.iter().any(Verification::is_refuted) {
            VerificationStatus::Refuted
        } else if verifications.iter().any(Verification::is_verified) {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Indeterminate
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verification_status() == VerificationStatus::Verified
    }

    pub fn is_refuted(&self) -> bool {
        self.verification_status() == VerificationStatus::Refuted
    }

    pub fn is_indeterminate(&self) -> bool {
        self.verification_status() == VerificationStatus::Indeterminate
    }

    /// Whether this part of the session needs no further authentication.
    /// Optional credential groups left blank count as satisfied.
    pub fn is_satisfied(&self) -> bool {
        self.is_satisfied_with(true)
    }

    /// Satisfaction, choosing whether a blank optional group counts.
    ///
    /// - Unspecialized: every credential group with mechanisms is satisfied
    ///   (vacuously true when there are none).
    /// - Credential group: has mechanisms, is not refuted, meets its
    ///   username/password requirements, and is then either a blank optional
    ///   group or verified.
    /// - Mechanism: verified.
    pub fn is_satisfied_with(&self, satisfied_if_optional: bool) -> bool {
        match &self.kind {
            ViewKind::Unspecialized => self
                .config()
                .credential_groups()
                .iter()
                .filter(|group| group.has_mechanisms())
                .all(|group| self.group_view(group).is_satisfied_with(satisfied_if_optional)),
            ViewKind::CredentialGroup(group) => {
                if !group.has_mechanisms() || self.is_refuted() {
                    return false;
                }
                if group.requires_username && !self.has_verified_principal() {
                    return false;
                }
                if group.requires_password && !self.has_verified_password() {
                    return false;
                }
                if satisfied_if_optional
                    && group.is_optional
                    && self.has_empty_principal()
                    && self.has_empty_password()
                {
                    return true;
                }
                self.is_verified()
            }
            ViewKind::Mechanism { .. } => self.is_verified(),
        }
    }

    /// The snapshot's cached view of `group`, or a detached one once the
    /// snapshot is gone.
    fn group_view(&self, group: &CredentialGroup) -> Arc<SessionView> {
        self.views
            .upgrade()
            .and_then(|views| views.group(&group.name).ok())
            .unwrap_or_else(|| {
                Arc::new(SessionView::for_credential_group(
                    Arc::clone(&self.snapshot),
                    Weak::new(),
                    group.clone(),
                ))
            })
    }

    fn unique(&self, kind: CredentialKind) -> Option<Credential> {
        unique_of_kind(&self.credentials(), kind).cloned()
    }

    fn unique_verified(&self, kind: CredentialKind) -> Option<Credential> {
        unique_of_kind(&self.verified_credentials(), kind).cloned()
    }
}
