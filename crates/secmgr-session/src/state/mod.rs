//! Append-only authentication session state.
//!
//! An [`AuthnSessionState`] is an immutable log of [`Instruction`]s. Every
//! mutator returns a new state sharing its prefix with the old one, which
//! makes states safe to hand across threads and cheap to diff against the
//! state they were derived from.

mod chain;
mod evolver;
pub mod instruction;
mod summary;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use secmgr_core::config::CredentialGroup;
use secmgr_core::error::AppError;
use secmgr_core::result::AppResult;
use secmgr_core::types::Authority;

use crate::cookie::Cookie;
use crate::credential::Credential;
use crate::verification::Verification;

pub use chain::Chain;
pub use instruction::{Instruction, Operation, OperationKind};
pub use summary::Summary;

use self::evolver::Evolver;

/// Immutable instruction log recording cookies, credentials, and
/// verifications per authority.
///
/// Two states are equal when their instruction sequences are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Instruction>", into = "Vec<Instruction>")]
pub struct AuthnSessionState {
    instructions: Chain<Instruction>,
}

impl AuthnSessionState {
    /// The empty state.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A state holding a single verification.
    pub fn of(authority: &Authority, verification: Verification) -> Self {
        Self::empty().add_verification(authority, verification)
    }

    /// Number of instructions in the log.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The instructions in log order.
    pub fn instructions(&self) -> Vec<Instruction> {
        self.instructions.to_vec()
    }

    /// Concatenates `delta` onto this state. Duplicate instructions are kept;
    /// they replay idempotently.
    pub fn add(&self, delta: &AuthnSessionState) -> Self {
        Self {
            instructions: self.instructions.extend(delta.instructions()),
        }
    }

    /// The instructions appended to `ancestor` to produce this state.
    ///
    /// `ancestor` must be the exact prior state this one was derived from
    /// (or an equal log). Anything else is rejected with a validation error
    /// so that divergent logs are never silently truncated.
    pub fn get_delta(&self, ancestor: &AuthnSessionState) -> AppResult<Self> {
        match self.instructions.suffix_after(&ancestor.instructions) {
            Some(suffix) => Ok(suffix.into_iter().collect()),
            None => {
                warn!(
                    len = self.len(),
                    ancestor_len = ancestor.len(),
                    "Rejected delta against a state that is not an ancestor"
                );
                Err(AppError::validation(
                    "Session state is not derived from the given ancestor",
                ))
            }
        }
    }

    /// Whether this state was derived from `ancestor` by appending.
    pub fn extends(&self, ancestor: &AuthnSessionState) -> bool {
        self.instructions.starts_with(&ancestor.instructions)
    }

    /// Records a cookie obtained from `authority`.
    pub fn add_cookie(&self, authority: &Authority, cookie: Cookie) -> Self {
        self.push(authority, Operation::AddCookie(cookie))
    }

    /// Records that `authority` no longer holds the cookie.
    pub fn remove_cookie(&self, authority: &Authority, cookie: Cookie) -> Self {
        self.push(authority, Operation::RemoveCookie(cookie))
    }

    /// Records a credential gathered by `authority`.
    pub fn add_credential(&self, authority: &Authority, credential: Credential) -> Self {
        self.push(authority, Operation::AddCredential(credential))
    }

    /// Records that a credential gathered by `authority` was withdrawn.
    pub fn remove_credential(&self, authority: &Authority, credential: Credential) -> Self {
        self.push(authority, Operation::RemoveCredential(credential))
    }

    /// Records a verification produced by `authority`.
    ///
    /// The verification's credentials are added to the authority's scope
    /// when the log is evolved, not here, so the log keeps causal order.
    pub fn add_verification(&self, authority: &Authority, verification: Verification) -> Self {
        self.push(authority, Operation::AddVerification(verification))
    }

    /// Records that a verification produced by `authority` was withdrawn.
    pub fn remove_verification(&self, authority: &Authority, verification: Verification) -> Self {
        self.push(authority, Operation::RemoveVerification(verification))
    }

    /// Replays the whole log from empty.
    pub fn compute_summary(&self, credential_groups: &[CredentialGroup]) -> Summary {
        let groups: Arc<[CredentialGroup]> = credential_groups.into();
        let mut evolver = Evolver::new(groups);
        evolver.apply_all(self.instructions().iter());
        evolver.into_summary()
    }

    /// Replays this log on top of `prior`.
    ///
    /// Typically called on a delta; the caller is responsible for `prior`
    /// having been computed from the state the delta extends.
    pub fn evolve_summary(&self, prior: &Summary) -> Summary {
        let mut evolver = Evolver::from_summary(prior);
        evolver.apply_all(self.instructions().iter());
        evolver.into_summary()
    }

    fn push(&self, authority: &Authority, operation: Operation) -> Self {
        Self {
            instructions: self
                .instructions
                .push(Instruction::new(authority.clone(), operation)),
        }
    }
}

impl FromIterator<Instruction> for AuthnSessionState {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self {
            instructions: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Instruction>> for AuthnSessionState {
    fn from(instructions: Vec<Instruction>) -> Self {
        instructions.into_iter().collect()
    }
}

impl From<AuthnSessionState> for Vec<Instruction> {
    fn from(state: AuthnSessionState) -> Self {
        state.instructions()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use secmgr_core::config::{AuthnMechanism, MechanismKind};

    use super::*;
    use crate::verification::Expiration;

    fn t(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn groups() -> Vec<CredentialGroup> {
        vec![
            CredentialGroup::new("Default")
                .with_mechanism(AuthnMechanism::new("form1", MechanismKind::Form))
                .with_mechanism(AuthnMechanism::new("basic1", MechanismKind::Basic)),
        ]
    }

    fn form1() -> Authority {
        Authority::for_mechanism("form1")
    }

    fn basic1() -> Authority {
        Authority::for_mechanism("basic1")
    }

    #[test]
    fn test_mutators_do_not_change_receiver() {
        let s0 = AuthnSessionState::empty();
        let s1 = s0.add_credential(&form1(), Credential::principal("alice"));
        assert!(s0.is_empty());
        assert_eq!(s1.len(), 1);
    }

    #[test]
    fn test_delta_round_trip() {
        let a = AuthnSessionState::empty().add_cookie(&form1(), Cookie::new("SID", "1"));
        let d = AuthnSessionState::empty()
            .add_credential(&form1(), Credential::principal("alice"))
            .add_credential(&form1(), Credential::password("pw"));
        let b = a.add(&d);

        let delta = b.get_delta(&a).expect("prefix");
        assert_eq!(delta, d);
        assert_eq!(a.add(&delta), b);
    }

    #[test]
    fn test_delta_against_non_ancestor_is_rejected() {
        let base = AuthnSessionState::empty().add_cookie(&form1(), Cookie::new("SID", "1"));
        let left = base.add_credential(&form1(), Credential::principal("alice"));
        let right = base.add_credential(&form1(), Credential::principal("bob"));
        let err = left.get_delta(&right).unwrap_err();
        assert_eq!(err.kind, secmgr_core::error::ErrorKind::Validation);
        assert!(left.extends(&base));
        assert!(!left.extends(&right));
    }

    #[test]
    fn test_duplicate_instructions_are_preserved() {
        let once = AuthnSessionState::empty().add_credential(&form1(), Credential::principal("a"));
        let twice = once.add(&once);
        assert_eq!(twice.len(), 2);
        assert_eq!(
            twice.compute_summary(&groups()).get_credentials(|_| true),
            once.compute_summary(&groups()).get_credentials(|_| true)
        );
    }

    #[test]
    fn test_verification_adds_its_credentials() {
        let v = Verification::verified(
            Expiration::Never,
            [Credential::principal("alice"), Credential::password("pw")],
        );
        let summary = AuthnSessionState::of(&form1(), v.clone()).compute_summary(&groups());

        let creds = summary.get_credentials(|a| *a == form1());
        assert_eq!(creds.len(), 2);
        assert_eq!(summary.verification(&form1()), Some(&v));
        // Held at the group, so visible from sibling mechanisms too.
        assert_eq!(summary.get_credentials(|a| *a == basic1()).len(), 2);
    }

    #[test]
    fn test_replacing_principal_invalidates_group_verifications() {
        let alice = Credential::principal("alice");
        let state = AuthnSessionState::empty()
            .add_verification(&form1(), Verification::verified(Expiration::Never, [alice.clone()]))
            .add_verification(&basic1(), Verification::verified(Expiration::Never, [alice]))
            .add_credential(&form1(), Credential::principal("bob"));
        let summary = state.compute_summary(&groups());

        assert!(summary.get_verifications(|_| true, None).is_empty());
        assert_eq!(
            summary.get_credentials(|_| true).into_iter().collect::<Vec<_>>(),
            vec![Credential::principal("bob")]
        );
    }

    #[test]
    fn test_adding_equal_credential_keeps_verification() {
        let alice = Credential::principal("alice");
        let state = AuthnSessionState::of(
            &form1(),
            Verification::verified(Expiration::Never, [alice.clone()]),
        )
        .add_credential(&basic1(), alice);
        let summary = state.compute_summary(&groups());
        assert_eq!(summary.get_verifications(|_| true, None).len(), 1);
    }

    #[test]
    fn test_stale_verification_removal_is_ignored() {
        let v1 = Verification::verified(Expiration::Never, [Credential::principal("alice")]);
        let v2 = Verification::refuted(Expiration::Never, [Credential::principal("alice")]);
        let state = AuthnSessionState::of(&form1(), v2.clone()).remove_verification(&form1(), v1);
        let summary = state.compute_summary(&groups());
        assert_eq!(summary.verification(&form1()), Some(&v2));

        let removed = state
            .remove_verification(&form1(), v2)
            .compute_summary(&groups());
        assert!(removed.verification(&form1()).is_none());
    }

    #[test]
    fn test_later_verification_replaces_former() {
        let alice = Credential::principal("alice");
        let state = AuthnSessionState::of(
            &form1(),
            Verification::refuted(Expiration::Never, [alice.clone()]),
        )
        .add_verification(&form1(), Verification::verified(Expiration::Never, [alice]));
        let summary = state.compute_summary(&groups());
        let stored = summary.get_verifications(|a| *a == form1(), None);
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_verified());
    }

    #[test]
    fn test_ungrouped_authority_keeps_conflicting_credentials() {
        let idp = Authority::new("urn:example:idp");
        let state = AuthnSessionState::empty()
            .add_credential(&idp, Credential::principal("alice"))
            .add_credential(&idp, Credential::principal("bob"));
        let summary = state.compute_summary(&groups());
        assert_eq!(summary.get_credentials(|a| *a == idp).len(), 2);
    }

    #[test]
    fn test_cookie_replacement_and_expiry_filter() {
        let state = AuthnSessionState::empty()
            .add_cookie(&form1(), Cookie::new("SID", "1").expiring_at(t(1_000)))
            .add_cookie(&form1(), Cookie::new("SID", "2").expiring_at(t(2_000)))
            .add_cookie(&form1(), Cookie::new("LANG", "en"));
        let summary = state.compute_summary(&groups());

        let all = summary.get_cookies(|_| true, None);
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|c| c.value == "2"));

        assert_eq!(summary.get_cookies(|_| true, Some(t(1_999))).len(), 2);
        assert_eq!(summary.get_cookies(|_| true, Some(t(2_000))).len(), 1);

        let removed = state
            .remove_cookie(&form1(), Cookie::new("LANG", "ignored"))
            .compute_summary(&groups());
        assert_eq!(removed.get_cookies(|_| true, None).len(), 1);
    }

    #[test]
    fn test_verification_expiry_filter() {
        let v = Verification::verified(
            Expiration::at(t(10_000)),
            [Credential::principal("alice")],
        );
        let summary = AuthnSessionState::of(&form1(), v).compute_summary(&groups());
        assert_eq!(summary.get_verifications(|_| true, Some(t(9_999))).len(), 1);
        assert!(summary.get_verifications(|_| true, Some(t(10_000))).is_empty());
        assert_eq!(summary.get_verifications(|_| true, None).len(), 1);
        // Credentials do not expire.
        assert_eq!(summary.get_credentials(|_| true).len(), 1);
    }

    #[test]
    fn test_evolve_summary_matches_full_replay() {
        let now = Utc::now();
        let s1 = AuthnSessionState::of(
            &form1(),
            Verification::verified(
                Expiration::at(now + Duration::minutes(5)),
                [Credential::principal("alice")],
            ),
        );
        let s2 = s1
            .add_cookie(&basic1(), Cookie::new("B", "1"))
            .remove_credential(&form1(), Credential::principal("alice"));

        let prior = s1.compute_summary(&groups());
        let evolved = s2.get_delta(&s1).unwrap().evolve_summary(&prior);
        let full = s2.compute_summary(&groups());

        assert_eq!(evolved.get_credentials(|_| true), full.get_credentials(|_| true));
        assert_eq!(
            evolved.get_verifications(|_| true, None),
            full.get_verifications(|_| true, None)
        );
        assert_eq!(evolved.get_cookies(|_| true, None), full.get_cookies(|_| true, None));
        // The prior summary is untouched.
        assert_eq!(prior.get_verifications(|_| true, None).len(), 1);
    }

    #[test]
    fn test_json_is_instruction_array() {
        let state = AuthnSessionState::empty()
            .add_credential(&form1(), Credential::principal("alice"))
            .add_cookie(&form1(), Cookie::new("SID", "1"));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(2));
        assert_eq!(json[0]["operation"], "ADD_CREDENTIAL");

        let parsed: AuthnSessionState = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, state);
    }
}
