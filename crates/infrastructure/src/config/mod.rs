//! Application configuration
//!
//! Split into focused sub-modules by concern:
//! - `server`: HTTP server settings
//! - `database`: SQLite database settings
//! - `rate_limit`: Per-tier request limits
//! - `session`: Session cookie and lifetimes
//! - `security`: CSRF marker and admin principals

mod database;
mod rate_limit;
mod security;
mod server;
mod session;

use std::collections::HashSet;

use application::ApplicationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use database::DatabaseConfig;
pub use rate_limit::{RateLimitConfig, TierConfig};
pub use security::{AdminUserEntry, CsrfConfig};
pub use server::ServerConfig;
pub use session::SessionAppConfig;

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "OCTOCRM";

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Session configuration
    #[serde(default)]
    pub session: SessionAppConfig,

    /// CSRF marker configuration
    #[serde(default)]
    pub csrf: CsrfConfig,

    /// Admin principals allowed to log in
    #[serde(default)]
    pub admin_users: Vec<AdminUserEntry>,
}

impl AppConfig {
    /// Load configuration from `config.toml` (optional) and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from the given file stem (optional) and the environment
    ///
    /// Environment variables override file values, e.g.
    /// `OCTOCRM__SERVER__PORT=8080` or `OCTOCRM__RATE_LIMIT__LOGIN__LIMIT=3`.
    pub fn load_from(file: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.allowed_origins")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        debug!(
            admin_users = config.admin_users.len(),
            rate_limit_enabled = config.rate_limit.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Reject configurations the gateway cannot run with safely
    pub fn validate(&self) -> Result<(), ApplicationError> {
        for (name, tier) in [
            ("authenticated", &self.rate_limit.authenticated),
            ("unauthenticated", &self.rate_limit.unauthenticated),
            ("login", &self.rate_limit.login),
        ] {
            if tier.limit == 0 || tier.window_secs == 0 {
                return Err(ApplicationError::Configuration(format!(
                    "rate_limit.{name} must have a non-zero limit and window"
                )));
            }
        }
        if self.rate_limit.cleanup_interval_secs == 0 {
            return Err(ApplicationError::Configuration(
                "rate_limit.cleanup_interval_secs must be non-zero".into(),
            ));
        }

        let session = &self.session;
        if session.standard_duration_secs == 0 || session.extended_duration_secs == 0 {
            return Err(ApplicationError::Configuration(
                "session durations must be non-zero".into(),
            ));
        }
        if session.refresh_threshold_secs >= session.standard_duration_secs {
            return Err(ApplicationError::Configuration(
                "session.refresh_threshold_secs must be smaller than the standard duration".into(),
            ));
        }
        if session.cookie_name.trim().is_empty() {
            return Err(ApplicationError::Configuration(
                "session.cookie_name must not be empty".into(),
            ));
        }

        if self.csrf.header_name.trim().is_empty() || self.csrf.expected_value.is_empty() {
            return Err(ApplicationError::Configuration(
                "csrf.header_name and csrf.expected_value must not be empty".into(),
            ));
        }

        let mut emails = HashSet::new();
        for user in &self.admin_users {
            user.principal().map_err(|e| {
                ApplicationError::Configuration(format!(
                    "admin user {} has an invalid id: {e}",
                    user.email
                ))
            })?;
            if !emails.insert(user.email.trim().to_lowercase()) {
                return Err(ApplicationError::Configuration(format!(
                    "admin user email {} is listed twice",
                    user.email
                )));
            }
        }

        Ok(())
    }
}
