//! In-memory rate limit ledger
//!
//! Fixed windows per identifier in a single map behind one mutex. Both the
//! request path and the stale-entry sweep take the same lock; the critical
//! section is a map lookup plus counter arithmetic and never awaits.

use std::{collections::HashMap, sync::Arc};

use application::{
    error::ApplicationError,
    ports::{Clock, RateLimitPort, SystemClock},
};
use async_trait::async_trait;
use chrono::Duration;
use domain::{RateLimitDecision, RateLimitPolicy, RateLimitWindow};
use parking_lot::Mutex;
use tracing::debug;

/// Process-local rate limit ledger
#[derive(Debug)]
pub struct InMemoryRateLimitLedger {
    windows: Mutex<HashMap<String, RateLimitWindow>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryRateLimitLedger {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryRateLimitLedger {
    /// Create an empty ledger reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of tracked identifiers
    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    /// Whether no identifier is tracked
    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }

    /// Count one request; synchronous core of [`RateLimitPort::check`]
    pub fn admit(&self, identifier: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let window = windows
            .entry(identifier.to_string())
            .or_insert_with(|| RateLimitWindow::open(now));
        window.admit(policy, now)
    }

    /// Drop windows older than `max_age`; synchronous core of the sweep
    pub fn sweep(&self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, window| !window.is_stale(now, max_age));
        before - windows.len()
    }
}

#[async_trait]
impl RateLimitPort for InMemoryRateLimitLedger {
    async fn check(
        &self,
        identifier: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, ApplicationError> {
        Ok(self.admit(identifier, policy))
    }

    async fn purge_stale(&self, max_age: Duration) -> Result<usize, ApplicationError> {
        let removed = self.sweep(max_age);
        if removed > 0 {
            debug!(removed, "Purged stale rate limit windows");
        }
        Ok(removed)
    }
}
