//! Replays an instruction log into per-authority maps.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, trace};

use secmgr_core::config::CredentialGroup;
use secmgr_core::types::Authority;

use crate::cookie::{Cookie, CookieKey};
use crate::credential::Credential;
use crate::verification::Verification;

use super::instruction::{Instruction, Operation};
use super::summary::Summary;

/// One-shot accumulator folding instructions into cookie, credential, and
/// verification maps.
///
/// Credentials added by any authority belonging to a credential group are
/// held under the group's own authority, so a group holds at most one
/// credential of each kind. Replacing or removing a group credential drops
/// every verification in the group that referenced the old value.
#[derive(Debug, Clone)]
pub(crate) struct Evolver {
    groups: Arc<[CredentialGroup]>,
    cookies: BTreeMap<Authority, BTreeMap<CookieKey, Cookie>>,
    credentials: BTreeMap<Authority, BTreeSet<Credential>>,
    verifications: BTreeMap<Authority, Verification>,
}

impl Evolver {
    /// An evolver with empty maps.
    pub(crate) fn new(groups: Arc<[CredentialGroup]>) -> Self {
        Self {
            groups,
            cookies: BTreeMap::new(),
            credentials: BTreeMap::new(),
            verifications: BTreeMap::new(),
        }
    }

    /// Resumes from the maps of a previously computed summary.
    pub(crate) fn from_summary(summary: &Summary) -> Self {
        let (groups, cookies, credentials, verifications) = summary.parts();
        Self {
            groups,
            cookies,
            credentials,
            verifications,
        }
    }

    /// Applies every instruction in order.
    pub(crate) fn apply_all<'a>(&mut self, instructions: impl IntoIterator<Item = &'a Instruction>) {
        for instruction in instructions {
            self.apply(instruction);
        }
    }

    /// Applies a single instruction.
    pub(crate) fn apply(&mut self, instruction: &Instruction) {
        let authority = &instruction.authority;
        trace!(authority = %authority, operation = ?instruction.operation.kind(), "Replaying instruction");

        match &instruction.operation {
            Operation::AddCookie(cookie) => {
                self.cookies
                    .entry(authority.clone())
                    .or_default()
                    .insert(cookie.key(), cookie.clone());
            }
            Operation::RemoveCookie(cookie) => {
                if let Some(jar) = self.cookies.get_mut(authority) {
                    jar.remove(&cookie.key());
                    if jar.is_empty() {
                        self.cookies.remove(authority);
                    }
                }
            }
            Operation::AddCredential(credential) => self.add_credential(authority, credential),
            Operation::RemoveCredential(credential) => {
                self.remove_credential(authority, credential)
            }
            Operation::AddVerification(verification) => {
                self.add_verification(authority, verification)
            }
            Operation::RemoveVerification(verification) => {
                if self.verifications.get(authority) == Some(verification) {
                    self.verifications.remove(authority);
                } else {
                    trace!(authority = %authority, "Ignoring stale verification removal");
                }
            }
        }
    }

    /// Freezes the accumulated maps.
    pub(crate) fn into_summary(self) -> Summary {
        Summary::new(self.groups, self.cookies, self.credentials, self.verifications)
    }

    fn add_verification(&mut self, authority: &Authority, verification: &Verification) {
        self.verifications
            .insert(authority.clone(), verification.clone());
        for credential in &verification.credentials {
            self.add_credential(authority, credential);
        }
    }

    fn add_credential(&mut self, authority: &Authority, credential: &Credential) {
        let groups = Arc::clone(&self.groups);
        let Some(group) = groups.iter().find(|g| g.owns(authority)) else {
            self.credentials
                .entry(authority.clone())
                .or_default()
                .insert(credential.clone());
            return;
        };

        let held = self.credentials.entry(group.authority()).or_default();
        if held.contains(credential) {
            return;
        }

        let replaced: Vec<Credential> = held
            .iter()
            .filter(|c| c.kind() == credential.kind())
            .cloned()
            .collect();
        for old in &replaced {
            held.remove(old);
        }
        held.insert(credential.clone());

        if !replaced.is_empty() {
            self.invalidate_verifications(&group.member_authorities(), &replaced);
        }
    }

    fn remove_credential(&mut self, authority: &Authority, credential: &Credential) {
        let groups = Arc::clone(&self.groups);
        let (holder, scope) = match groups.iter().find(|g| g.owns(authority)) {
            Some(group) => (group.authority(), group.member_authorities()),
            None => (authority.clone(), vec![authority.clone()]),
        };

        let Some(held) = self.credentials.get_mut(&holder) else {
            return;
        };
        if !held.remove(credential) {
            return;
        }
        if held.is_empty() {
            self.credentials.remove(&holder);
        }

        self.invalidate_verifications(&scope, std::slice::from_ref(credential));
    }

    fn invalidate_verifications(&mut self, scope: &[Authority], removed: &[Credential]) {
        for authority in scope {
            let stale = self
                .verifications
                .get(authority)
                .is_some_and(|v| v.references_any(removed));
            if stale {
                self.verifications.remove(authority);
                debug!(authority = %authority, "Invalidated verification referencing a changed credential");
            }
        }
    }
}
