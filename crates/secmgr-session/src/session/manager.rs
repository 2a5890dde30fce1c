//! Registry of live authentication sessions with idle cleanup.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use secmgr_core::config::{SecurityManagerConfig, SessionConfig};
use secmgr_core::error::AppError;
use secmgr_core::result::AppResult;
use secmgr_core::traits::Clock;
use secmgr_core::types::SessionId;

use super::authn::AuthnSession;

/// Creates, finds, and expires authentication sessions.
#[derive(Clone)]
pub struct SessionManager {
    /// Live sessions by ID.
    sessions: Arc<DashMap<SessionId, Arc<AuthnSession>>>,
    /// Credential groups shared by every session.
    config: Arc<SecurityManagerConfig>,
    /// Session timeouts.
    session_config: SessionConfig,
    /// Time source for new sessions and idle checks.
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .field("session_config", &self.session_config)
            .finish()
    }
}

impl SessionManager {
    /// Creates an empty registry.
    pub fn new(
        config: Arc<SecurityManagerConfig>,
        session_config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            config,
            session_config,
            clock,
        }
    }

    /// Starts a new empty session and registers it.
    pub fn create_session(&self) -> Arc<AuthnSession> {
        let session = Arc::new(AuthnSession::new(
            Arc::clone(&self.config),
            Arc::clone(&self.clock),
        ));
        self.sessions.insert(session.id(), Arc::clone(&session));
        session
    }

    /// Finds a live session.
    pub fn find(&self, id: SessionId) -> Option<Arc<AuthnSession>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Finds a live session that has not gone idle, marking it used.
    pub fn get(&self, id: SessionId) -> AppResult<Arc<AuthnSession>> {
        let session = self
            .find(id)
            .ok_or_else(|| AppError::not_found(format!("Unknown session {id}")))?;
        if session.is_idle(self.session_config.idle_timeout()) {
            self.sessions.remove(&id);
            info!(session_id = %id, "Session expired on access");
            return Err(AppError::session(format!("Session {id} has expired")));
        }
        session.touch();
        Ok(session)
    }

    /// Drops a session. Returns it if it was registered.
    pub fn remove(&self, id: SessionId) -> Option<Arc<AuthnSession>> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Removes every idle session.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_idle(&self) -> usize {
        let timeout = self.session_config.idle_timeout();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !session.is_idle(timeout));
        let removed = before.saturating_sub(self.sessions.len());

        if removed > 0 {
            info!(count = removed, "Cleaned up idle authentication sessions");
        }
        removed
    }
}
