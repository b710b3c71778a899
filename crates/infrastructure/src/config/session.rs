//! Browser session configuration.

use application::SessionConfig;
use serde::{Deserialize, Serialize};

use super::default_true;

/// Session cookie and lifetime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAppConfig {
    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Set the `Secure` attribute on the cookie (disable only for plain-HTTP development)
    #[serde(default = "default_true")]
    pub secure_cookie: bool,

    /// Lifetime of a regular session in seconds (default: 24h)
    #[serde(default = "default_standard")]
    pub standard_duration_secs: u64,

    /// Lifetime of a "remember me" session in seconds (default: 30 days)
    #[serde(default = "default_extended")]
    pub extended_duration_secs: u64,

    /// Remaining lifetime below which a session is refreshed (default: 6h)
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold_secs: u64,

    /// How often expired sessions are deleted, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

fn default_cookie_name() -> String {
    "octocrm_session".to_string()
}

const fn default_standard() -> u64 {
    24 * 60 * 60
}

const fn default_extended() -> u64 {
    30 * 24 * 60 * 60
}

const fn default_refresh_threshold() -> u64 {
    6 * 60 * 60
}

const fn default_cleanup_interval() -> u64 {
    60 * 60
}

impl Default for SessionAppConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            secure_cookie: true,
            standard_duration_secs: default_standard(),
            extended_duration_secs: default_extended(),
            refresh_threshold_secs: default_refresh_threshold(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

impl SessionAppConfig {
    /// Lifetimes for the session service
    #[allow(clippy::cast_possible_wrap)]
    pub fn lifetimes(&self) -> SessionConfig {
        SessionConfig {
            standard: chrono::Duration::seconds(self.standard_duration_secs as i64),
            extended: chrono::Duration::seconds(self.extended_duration_secs as i64),
            refresh_threshold: chrono::Duration::seconds(self.refresh_threshold_secs as i64),
        }
    }

    /// Interval of the expired-session sweep
    pub const fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_secs)
    }
}
