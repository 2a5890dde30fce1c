//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod logging;
pub mod security;
pub mod session;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::security::{AuthnMechanism, CredentialGroup, MechanismKind, SecurityManagerConfig};
pub use self::session::SessionConfig;

use crate::error::AppError;
use crate::result::AppResult;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Authentication session settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Credential groups and their mechanisms.
    #[serde(default)]
    pub security: SecurityManagerConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, which must exist.
    ///
    /// Values from the file are overridden by environment variables prefixed
    /// with `SECMGR__` (e.g. `SECMGR__LOGGING__LEVEL=debug`). The resulting
    /// security manager configuration is validated before it is returned.
    pub fn load(path: &str) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(true))
            .add_source(
                config::Environment::with_prefix("SECMGR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        app.security.validate()?;
        Ok(app)
    }
}
