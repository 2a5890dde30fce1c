//! Point-in-time session snapshots and their view cache.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use secmgr_core::config::{AuthnMechanism, CredentialGroup, SecurityManagerConfig};
use secmgr_core::error::AppError;
use secmgr_core::result::AppResult;
use secmgr_core::types::{Authority, SessionId};

use crate::cookie::Cookie;
use crate::state::{AuthnSessionState, Summary};
use crate::view::SessionView;

/// Immutable snapshot contents shared by the snapshot and all of its views.
#[derive(Debug)]
pub(crate) struct SnapshotData {
    pub(crate) session_id: SessionId,
    pub(crate) config: Arc<SecurityManagerConfig>,
    pub(crate) authn_entry_url: Option<String>,
    pub(crate) user_agent_cookies: Vec<Cookie>,
    pub(crate) state: AuthnSessionState,
    pub(crate) time_stamp: DateTime<Utc>,
    summary: OnceLock<Summary>,
}

impl SnapshotData {
    /// The evolved state, computed on first use.
    pub(crate) fn summary(&self) -> &Summary {
        self.summary
            .get_or_init(|| self.state.compute_summary(self.config.credential_groups()))
    }
}

/// Builder for [`SessionSnapshot`].
#[derive(Debug)]
pub struct SnapshotBuilder {
    session_id: SessionId,
    config: Arc<SecurityManagerConfig>,
    state: AuthnSessionState,
    time_stamp: DateTime<Utc>,
    authn_entry_url: Option<String>,
    user_agent_cookies: Vec<Cookie>,
    summary: Option<Summary>,
}

impl SnapshotBuilder {
    /// URL the user agent entered authentication from.
    pub fn authn_entry_url(mut self, url: impl Into<String>) -> Self {
        self.authn_entry_url = Some(url.into());
        self
    }

    /// Cookies presented by the user agent.
    pub fn user_agent_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.user_agent_cookies = cookies;
        self
    }

    /// A summary already computed for exactly this state, e.g. by evolving
    /// a prior summary with a delta.
    pub fn summary(mut self, summary: Summary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Freezes the snapshot.
    pub fn build(self) -> SessionSnapshot {
        let summary = match self.summary {
            Some(summary) => OnceLock::from(summary),
            None => OnceLock::new(),
        };
        let data = Arc::new(SnapshotData {
            session_id: self.session_id,
            config: self.config,
            authn_entry_url: self.authn_entry_url,
            user_agent_cookies: self.user_agent_cookies,
            state: self.state,
            time_stamp: self.time_stamp,
            summary,
        });
        SessionSnapshot {
            views: Arc::new(ViewCache::new(data)),
        }
    }
}

/// Views of one snapshot, built on demand and kept for its lifetime.
///
/// Views hold a [`Weak`](std::sync::Weak) reference back to this cache so that an
/// unspecialized view can reuse the cached credential group views.
#[derive(Debug)]
pub(crate) struct ViewCache {
    data: Arc<SnapshotData>,
    unspecialized: OnceLock<Arc<SessionView>>,
    mechanisms: DashMap<String, Arc<SessionView>>,
    groups: DashMap<String, Arc<SessionView>>,
}

impl ViewCache {
    fn new(data: Arc<SnapshotData>) -> Self {
        Self {
            data,
            unspecialized: OnceLock::new(),
            mechanisms: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    fn unspecialized(self: &Arc<Self>) -> Arc<SessionView> {
        Arc::clone(self.unspecialized.get_or_init(|| {
            Arc::new(SessionView::unspecialized(
                Arc::clone(&self.data),
                Arc::downgrade(self),
            ))
        }))
    }

    fn mechanism(self: &Arc<Self>, name: &str) -> AppResult<Arc<SessionView>> {
        if let Some(view) = self.mechanisms.get(name) {
            return Ok(Arc::clone(view.value()));
        }

        let config = &self.data.config;
        let (mechanism, group) = config
            .mechanism(name)
            .zip(config.group_of_mechanism(name))
            .ok_or_else(|| AppError::not_found(format!("Unknown mechanism '{name}'")))?;

        let view = Arc::new(SessionView::for_mechanism(
            Arc::clone(&self.data),
            Arc::downgrade(self),
            mechanism.clone(),
            group.clone(),
        ));
        debug!(session_id = %self.data.session_id, mechanism = %name, "Built mechanism view");

        Ok(Arc::clone(
            self.mechanisms
                .entry(name.to_string())
                .or_insert(view)
                .value(),
        ))
    }

    pub(crate) fn group(self: &Arc<Self>, name: &str) -> AppResult<Arc<SessionView>> {
        if let Some(view) = self.groups.get(name) {
            return Ok(Arc::clone(view.value()));
        }

        let group = self
            .data
            .config
            .credential_group(name)
            .ok_or_else(|| AppError::not_found(format!("Unknown credential group '{name}'")))?;

        let view = Arc::new(SessionView::for_credential_group(
            Arc::clone(&self.data),
            Arc::downgrade(self),
            group.clone(),
        ));
        debug!(session_id = %self.data.session_id, group = %name, "Built credential group view");

        Ok(Arc::clone(
            self.groups
                .entry(name.to_string())
                .or_insert(view)
                .value(),
        ))
    }
}

/// An immutable pairing of session identity, configuration, and state at
/// one instant.
///
/// Views are derived on demand and cached for the lifetime of the snapshot,
/// one per mechanism, one per credential group, and one unspecialized.
/// Views are pure projections, so two threads racing to build the same view
/// may both construct it; only the first insert is kept.
#[derive(Debug)]
pub struct SessionSnapshot {
    views: Arc<ViewCache>,
}

impl SessionSnapshot {
    /// Starts building a snapshot.
    pub fn builder(
        session_id: SessionId,
        config: Arc<SecurityManagerConfig>,
        state: AuthnSessionState,
        time_stamp: DateTime<Utc>,
    ) -> SnapshotBuilder {
        SnapshotBuilder {
            session_id,
            config,
            state,
            time_stamp,
            authn_entry_url: None,
            user_agent_cookies: Vec::new(),
            summary: None,
        }
    }

    fn data(&self) -> &SnapshotData {
        &self.views.data
    }

    pub fn session_id(&self) -> SessionId {
        self.data().session_id
    }

    pub fn config(&self) -> &Arc<SecurityManagerConfig> {
        &self.data().config
    }

    pub fn authn_entry_url(&self) -> Option<&str> {
        self.data().authn_entry_url.as_deref()
    }

    pub fn user_agent_cookies(&self) -> &[Cookie] {
        &self.data().user_agent_cookies
    }

    pub fn state(&self) -> &AuthnSessionState {
        &self.data().state
    }

    pub fn time_stamp(&self) -> DateTime<Utc> {
        self.data().time_stamp
    }

    /// The evolved state, computed on first use.
    pub fn summary(&self) -> &Summary {
        self.data().summary()
    }

    /// The unspecialized view.
    pub fn view(&self) -> Arc<SessionView> {
        self.views.unspecialized()
    }

    /// The view specialized for a mechanism of this snapshot's configuration.
    pub fn view_for_mechanism(&self, mechanism: &AuthnMechanism) -> AppResult<Arc<SessionView>> {
        self.view_for_mechanism_named(&mechanism.name)
    }

    /// The view specialized for the named mechanism.
    pub fn view_for_mechanism_named(&self, name: &str) -> AppResult<Arc<SessionView>> {
        self.views.mechanism(name)
    }

    /// The view specialized for a credential group of this snapshot's
    /// configuration.
    pub fn view_for_credential_group(
        &self,
        group: &CredentialGroup,
    ) -> AppResult<Arc<SessionView>> {
        self.view_for_group_named(&group.name)
    }

    /// The view specialized for the named credential group.
    pub fn view_for_group_named(&self, name: &str) -> AppResult<Arc<SessionView>> {
        self.views.group(name)
    }

    /// The view for whichever mechanism or credential group owns `authority`.
    pub fn view_for_authority(&self, authority: &Authority) -> AppResult<Arc<SessionView>> {
        let config = &self.data().config;
        if let Some(mechanism) = config.mechanism_for(authority) {
            return self.view_for_mechanism_named(&mechanism.name);
        }
        match config
            .credential_groups()
            .iter()
            .find(|g| g.authority() == *authority)
        {
            Some(group) => self.view_for_group_named(&group.name),
            None => Err(AppError::not_found(format!(
                "No mechanism or credential group owns authority '{authority}'"
            ))),
        }
    }

    /// The credential group view whose verified principal identifies the
    /// user.
    ///
    /// The default group wins whenever it has a verified principal;
    /// otherwise the first such group in configured order is returned.
    pub fn primary_verified_view(&self) -> Option<Arc<SessionView>> {
        let config = Arc::clone(&self.data().config);
        let mut first_found = None;

        for group in config.credential_groups() {
            let Ok(view) = self.view_for_credential_group(group) else {
                continue;
            };
            if !view.has_verified_principal() {
                continue;
            }
            if config.is_default(group) {
                return Some(view);
            }
            if first_found.is_none() {
                first_found = Some(view);
            }
        }

        first_found
    }
}
