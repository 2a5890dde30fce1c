//! The working authentication session an authentication controller mutates.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use secmgr_core::config::SecurityManagerConfig;
use secmgr_core::result::AppResult;
use secmgr_core::traits::Clock;
use secmgr_core::types::SessionId;

use crate::cookie::Cookie;
use crate::exported::ExportedState;
use crate::snapshot::SessionSnapshot;
use crate::state::{AuthnSessionState, Summary};

#[derive(Debug)]
struct SessionInner {
    state: AuthnSessionState,
    authn_entry_url: Option<String>,
    user_agent_cookies: Vec<Cookie>,
    last_access: DateTime<Utc>,
    /// Most recent state a summary was computed for, with that summary.
    evolved: Option<(AuthnSessionState, Summary)>,
}

/// A session whose state grows as authentication proceeds.
///
/// Callers accumulate facts with [`update_state`](Self::update_state) and
/// freeze them with [`snapshot`](Self::snapshot). Each snapshot's summary is
/// evolved from the previous snapshot's when the state has only been
/// appended to since.
#[derive(Debug)]
pub struct AuthnSession {
    id: SessionId,
    config: Arc<SecurityManagerConfig>,
    clock: Arc<dyn Clock>,
    created_at: DateTime<Utc>,
    inner: RwLock<SessionInner>,
}

impl AuthnSession {
    /// Creates an empty session.
    pub fn new(config: Arc<SecurityManagerConfig>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let id = SessionId::new();
        info!(session_id = %id, "Created authentication session");
        Self {
            id,
            config,
            clock,
            created_at: now,
            inner: RwLock::new(SessionInner {
                state: AuthnSessionState::empty(),
                authn_entry_url: None,
                user_agent_cookies: Vec::new(),
                last_access: now,
                evolved: None,
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &Arc<SecurityManagerConfig> {
        &self.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The current state.
    pub fn state(&self) -> AuthnSessionState {
        self.inner.read().state.clone()
    }

    /// Replaces the state with `f(current)`.
    pub fn update_state<F>(&self, f: F)
    where
        F: FnOnce(&AuthnSessionState) -> AuthnSessionState,
    {
        let mut inner = self.inner.write();
        inner.state = f(&inner.state);
        inner.last_access = self.clock.now();
    }

    /// Appends `delta` to the state.
    pub fn apply_delta(&self, delta: &AuthnSessionState) {
        self.update_state(|state| state.add(delta));
    }

    pub fn set_authn_entry_url(&self, url: impl Into<String>) {
        self.inner.write().authn_entry_url = Some(url.into());
    }

    /// Records the cookies presented by the user agent on the latest request.
    pub fn set_user_agent_cookies(&self, cookies: Vec<Cookie>) {
        self.inner.write().user_agent_cookies = cookies;
    }

    /// Marks the session as used now.
    pub fn touch(&self) {
        self.inner.write().last_access = self.clock.now();
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        self.inner.read().last_access
    }

    /// Whether the session has gone unused for at least `idle_timeout`.
    pub fn is_idle(&self, idle_timeout: Duration) -> bool {
        self.clock.now() - self.last_access() >= idle_timeout
    }

    /// Freezes the current state at the clock's current time.
    pub fn snapshot(&self) -> SessionSnapshot {
        let time_stamp = self.clock.now();
        let (state, authn_entry_url, user_agent_cookies, evolved) = {
            let inner = self.inner.read();
            (
                inner.state.clone(),
                inner.authn_entry_url.clone(),
                inner.user_agent_cookies.clone(),
                inner.evolved.clone(),
            )
        };

        let delta = evolved.as_ref().and_then(|(prior_state, prior_summary)| {
            if !state.extends(prior_state) {
                return None;
            }
            state.get_delta(prior_state).ok().map(|delta| (delta, prior_summary))
        });
        let summary = match delta {
            Some((delta, prior_summary)) => {
                debug!(session_id = %self.id, delta = delta.len(), "Evolving prior summary");
                delta.evolve_summary(prior_summary)
            }
            None => {
                debug!(session_id = %self.id, instructions = state.len(), "Replaying session state");
                state.compute_summary(self.config.credential_groups())
            }
        };

        self.inner.write().evolved = Some((state.clone(), summary.clone()));

        let mut builder =
            SessionSnapshot::builder(self.id, Arc::clone(&self.config), state, time_stamp)
                .user_agent_cookies(user_agent_cookies)
                .summary(summary);
        if let Some(url) = authn_entry_url {
            builder = builder.authn_entry_url(url);
        }
        builder.build()
    }

    /// Flattens a fresh snapshot for the search appliance.
    pub fn export_state(&self) -> AppResult<ExportedState> {
        ExportedState::from_snapshot(&self.snapshot())
    }

    /// Appends the instruction log carried by an exported state, e.g. one
    /// produced by a federated identity provider.
    pub fn import_state(&self, exported: &ExportedState) {
        debug!(
            session_id = %self.id,
            instructions = exported.session_state().len(),
            "Importing exported session state"
        );
        self.apply_delta(exported.session_state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use secmgr_core::config::{AuthnMechanism, CredentialGroup, MechanismKind};
    use secmgr_core::traits::FixedClock;
    use secmgr_core::types::Authority;

    use crate::credential::Credential;

    fn session() -> AuthnSession {
        let config = SecurityManagerConfig::new(vec![
            CredentialGroup::new("Default")
                .with_mechanism(AuthnMechanism::new("form1", MechanismKind::Form)),
        ]);
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        AuthnSession::new(Arc::new(config), Arc::new(FixedClock::new(now)))
    }

    fn cached_state(session: &AuthnSession) -> Option<AuthnSessionState> {
        session.inner.read().evolved.as_ref().map(|(state, _)| state.clone())
    }

    #[test]
    fn test_snapshot_caches_latest_state() {
        let session = session();
        let form1 = Authority::for_mechanism("form1");
        session.update_state(|s| s.add_credential(&form1, Credential::principal("alice")));
        let _ = session.snapshot();
        assert_eq!(cached_state(&session), Some(session.state()));

        session.update_state(|s| s.add_credential(&form1, Credential::password("pw")));
        let snapshot = session.snapshot();
        assert_eq!(cached_state(&session), Some(session.state()));
        assert_eq!(snapshot.summary().get_credentials(|_| true).len(), 2);
    }

    #[test]
    fn test_divergent_state_is_replayed_from_scratch() {
        let session = session();
        let form1 = Authority::for_mechanism("form1");
        session.update_state(|s| s.add_credential(&form1, Credential::principal("alice")));
        let _ = session.snapshot();

        let replacement = AuthnSessionState::empty().add_credential(&form1, Credential::principal("bob"));
        assert!(!replacement.extends(&session.state()));
        session.update_state(|_| replacement.clone());

        let snapshot = session.snapshot();
        assert_eq!(cached_state(&session), Some(replacement));
        let credentials = snapshot.summary().get_credentials(|_| true);
        assert_eq!(
            credentials.into_iter().collect::<Vec<_>>(),
            vec![Credential::principal("bob")]
        );
    }
}
