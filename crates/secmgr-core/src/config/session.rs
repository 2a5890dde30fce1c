//! Authentication session configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Authentication session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle timeout in minutes before a session is considered abandoned.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_minutes: u64,
}

impl SessionConfig {
    /// The idle timeout as a duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::minutes(self.idle_timeout_minutes as i64)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: default_idle_timeout(),
        }
    }
}

fn default_idle_timeout() -> u64 {
    30
}
