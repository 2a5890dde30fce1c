//! Frozen, queryable result of replaying a session state log.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use secmgr_core::config::CredentialGroup;
use secmgr_core::types::Authority;

use crate::cookie::{Cookie, CookieKey};
use crate::credential::Credential;
use crate::verification::Verification;

/// Per-authority cookies, credentials, and verifications.
///
/// Accessors select authorities with a predicate. Credentials held by a
/// credential group are selected when the predicate matches the group's
/// authority or any of its mechanisms' authorities. Cookies and
/// verifications may additionally be filtered by a point in time, dropping
/// entries whose expiry is at or before it; credentials never expire.
#[derive(Debug, Clone)]
pub struct Summary {
    groups: Arc<[CredentialGroup]>,
    cookies: BTreeMap<Authority, BTreeMap<CookieKey, Cookie>>,
    credentials: BTreeMap<Authority, BTreeSet<Credential>>,
    verifications: BTreeMap<Authority, Verification>,
}

impl Summary {
    pub(crate) fn new(
        groups: Arc<[CredentialGroup]>,
        cookies: BTreeMap<Authority, BTreeMap<CookieKey, Cookie>>,
        credentials: BTreeMap<Authority, BTreeSet<Credential>>,
        verifications: BTreeMap<Authority, Verification>,
    ) -> Self {
        Self {
            groups,
            cookies,
            credentials,
            verifications,
        }
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn parts(
        &self,
    ) -> (
        Arc<[CredentialGroup]>,
        BTreeMap<Authority, BTreeMap<CookieKey, Cookie>>,
        BTreeMap<Authority, BTreeSet<Credential>>,
        BTreeMap<Authority, Verification>,
    ) {
        (
            Arc::clone(&self.groups),
            self.cookies.clone(),
            self.credentials.clone(),
            self.verifications.clone(),
        )
    }

    /// Credential groups used to resolve authorities while evolving.
    pub fn credential_groups(&self) -> &[CredentialGroup] {
        &self.groups
    }

    /// Cookies from matching authorities, optionally dropping those expired
    /// at `time`.
    pub fn get_cookies<F>(&self, filter: F, time: Option<DateTime<Utc>>) -> Vec<Cookie>
    where
        F: Fn(&Authority) -> bool,
    {
        self.cookies
            .iter()
            .filter(|(authority, _)| filter(authority))
            .flat_map(|(_, jar)| jar.values())
            .filter(|cookie| time.is_none_or(|t| !cookie.is_expired(t)))
            .cloned()
            .collect()
    }

    /// Union of credentials held by matching authorities.
    pub fn get_credentials<F>(&self, filter: F) -> BTreeSet<Credential>
    where
        F: Fn(&Authority) -> bool,
    {
        self.credentials
            .iter()
            .filter(|(holder, _)| self.holder_matches(holder, &filter))
            .flat_map(|(_, held)| held.iter().cloned())
            .collect()
    }

    /// Verifications stored under matching authorities, optionally dropping
    /// those expired at `time`.
    pub fn get_verifications<F>(&self, filter: F, time: Option<DateTime<Utc>>) -> Vec<Verification>
    where
        F: Fn(&Authority) -> bool,
    {
        self.verifications
            .iter()
            .filter(|(authority, _)| filter(authority))
            .map(|(_, verification)| verification)
            .filter(|v| time.is_none_or(|t| !v.has_expired(t)))
            .cloned()
            .collect()
    }

    /// The verification stored for exactly this authority, expired or not.
    pub fn verification(&self, authority: &Authority) -> Option<&Verification> {
        self.verifications.get(authority)
    }

    /// Authorities that currently hold a verification.
    pub fn verified_authorities(&self) -> impl Iterator<Item = &Authority> {
        self.verifications.keys()
    }

    fn holder_matches<F>(&self, holder: &Authority, filter: &F) -> bool
    where
        F: Fn(&Authority) -> bool,
    {
        if filter(holder) {
            return true;
        }
        self.groups
            .iter()
            .find(|g| g.authority() == *holder)
            .is_some_and(|g| g.mechanisms.iter().any(|m| filter(&m.authority())))
    }
}
