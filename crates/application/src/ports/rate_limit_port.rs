//! Port for rate-limit counting

use async_trait::async_trait;
use chrono::Duration;
use domain::{RateLimitDecision, RateLimitPolicy};

#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for a fixed-window request ledger
///
/// Implementations must make `check` atomic per identifier: concurrent
/// checks for one identifier never admit more than `policy.limit` requests
/// in a window.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RateLimitPort: Send + Sync {
    /// Count one request for `identifier` and decide whether it may proceed
    async fn check(
        &self,
        identifier: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, ApplicationError>;

    /// Drop windows that started more than `max_age` ago
    async fn purge_stale(&self, max_age: Duration) -> Result<usize, ApplicationError>;
}
