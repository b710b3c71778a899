//! Rate limiting configuration: one `{limit, window}` pair per tier.

use std::time::Duration;

use domain::{RateLimitPolicy, RateLimitTier};
use serde::{Deserialize, Serialize};

use super::default_true;

/// Limit and window of one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Requests allowed per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl TierConfig {
    /// Convert into the domain policy
    pub const fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::per_seconds(self.limit, self.window_secs)
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests carrying a verified API key or session
    #[serde(default = "default_authenticated")]
    pub authenticated: TierConfig,

    /// Anonymous requests, keyed by client address
    #[serde(default = "default_unauthenticated")]
    pub unauthenticated: TierConfig,

    /// Login attempts, always keyed by client address
    #[serde(default = "default_login")]
    pub login: TierConfig,

    /// How often stale ledger entries are swept, in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

const fn default_authenticated() -> TierConfig {
    TierConfig {
        limit: 300,
        window_secs: 60,
    }
}

const fn default_unauthenticated() -> TierConfig {
    TierConfig {
        limit: 60,
        window_secs: 60,
    }
}

const fn default_login() -> TierConfig {
    TierConfig {
        limit: 5,
        window_secs: 900,
    }
}

const fn default_cleanup_interval() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            authenticated: default_authenticated(),
            unauthenticated: default_unauthenticated(),
            login: default_login(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

impl RateLimitConfig {
    /// Policy of `tier`
    pub const fn policy(&self, tier: RateLimitTier) -> RateLimitPolicy {
        match tier {
            RateLimitTier::Authenticated => self.authenticated.policy(),
            RateLimitTier::Unauthenticated => self.unauthenticated.policy(),
            RateLimitTier::Login => self.login.policy(),
        }
    }

    /// Age after which a ledger entry is considered stale
    ///
    /// Twice the longest configured window.
    pub fn stale_after(&self) -> Duration {
        let longest = self
            .authenticated
            .window_secs
            .max(self.unauthenticated.window_secs)
            .max(self.login.window_secs);
        Duration::from_secs(longest.saturating_mul(2))
    }

    /// Sweep interval
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
