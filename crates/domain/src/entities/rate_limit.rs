//! Rate limit windows and policies
//!
//! Fixed-duration counting windows keyed by an identifier. A window that has
//! run its full duration is replaced on the next read instead of
//! accumulating further.

use std::{fmt, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound for a configured window (one year)
const MAX_WINDOW_SECS: i64 = 365 * 24 * 60 * 60;

/// Policy tier a request is counted under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitTier {
    /// Request carried a verified credential
    Authenticated,
    /// Anonymous request, keyed by network address
    Unauthenticated,
    /// Login attempt, always keyed by network address
    Login,
}

impl RateLimitTier {
    /// Namespace prefix for ledger identifiers of this tier
    pub const fn namespace(&self) -> &'static str {
        match self {
            Self::Authenticated => "auth",
            Self::Unauthenticated => "anon",
            Self::Login => "login",
        }
    }
}

impl fmt::Display for RateLimitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

/// Limit and window of one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Requests allowed per window
    pub limit: u32,
    /// Window length
    pub window: StdDuration,
}

impl RateLimitPolicy {
    /// Create a policy
    pub const fn new(limit: u32, window: StdDuration) -> Self {
        Self { limit, window }
    }

    /// Convenience constructor from whole seconds
    pub const fn per_seconds(limit: u32, window_secs: u64) -> Self {
        Self::new(limit, StdDuration::from_secs(window_secs))
    }

    /// Window length as a chrono duration, clamped to one year
    pub fn window_delta(&self) -> Duration {
        let millis = i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX);
        Duration::milliseconds(millis.min(MAX_WINDOW_SECS * 1000))
    }
}

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Limit of the policy that was applied
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// End of the current window, Unix seconds (rounded up)
    pub reset_at: i64,
    /// Seconds until the window ends, only set on denial (at least 1)
    pub retry_after: Option<u64>,
}

/// Counting state for one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    count: u32,
    started_at: DateTime<Utc>,
}

impl RateLimitWindow {
    /// Open an empty window at `now`
    pub const fn open(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            started_at: now,
        }
    }

    /// Requests counted in this window
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// When this window started
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Count one request against `policy`
    ///
    /// A window whose duration has fully elapsed is restarted at `now` with
    /// this request as its first. Denied requests do not increment the count.
    pub fn admit(&mut self, policy: &RateLimitPolicy, now: DateTime<Utc>) -> RateLimitDecision {
        let window = policy.window_delta();
        if now - self.started_at >= window {
            *self = Self::open(now);
        }

        let reset_instant = self.started_at + window;
        let reset_at = ceil_unix_seconds(reset_instant);

        if self.count < policy.limit {
            self.count += 1;
            RateLimitDecision {
                allowed: true,
                limit: policy.limit,
                remaining: policy.limit - self.count,
                reset_at,
                retry_after: None,
            }
        } else {
            let wait_ms = u64::try_from((reset_instant - now).num_milliseconds()).unwrap_or(0);
            let retry_after = wait_ms.div_ceil(1000).max(1);
            RateLimitDecision {
                allowed: false,
                limit: policy.limit,
                remaining: 0,
                reset_at,
                retry_after: Some(retry_after),
            }
        }
    }

    /// Whether the window started more than `max_age` before `now`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.started_at > max_age
    }
}

fn ceil_unix_seconds(instant: DateTime<Utc>) -> i64 {
    let secs = instant.timestamp();
    if instant.timestamp_subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn counts_down_then_denies() {
        let policy = RateLimitPolicy::per_seconds(3, 60);
        let mut window = RateLimitWindow::open(t0());

        let remaining: Vec<u32> = (0..3)
            .map(|i| window.admit(&policy, t0() + Duration::seconds(i)).remaining)
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let denied = window.admit(&policy, t0() + Duration::seconds(10));
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.retry_after, Some(50));
        assert_eq!(window.count(), 3);
    }

    #[test]
    fn reset_at_is_window_end_for_allow_and_deny() {
        let policy = RateLimitPolicy::per_seconds(1, 60);
        let mut window = RateLimitWindow::open(t0());
        let expected = (t0() + Duration::seconds(60)).timestamp();

        assert_eq!(window.admit(&policy, t0()).reset_at, expected);
        assert_eq!(window.admit(&policy, t0() + Duration::seconds(5)).reset_at, expected);
    }

    #[test]
    fn elapsed_window_is_replaced_not_accumulated() {
        let policy = RateLimitPolicy::per_seconds(2, 60);
        let mut window = RateLimitWindow::open(t0());
        window.admit(&policy, t0());
        window.admit(&policy, t0());

        let later = t0() + Duration::seconds(60);
        let decision = window.admit(&policy, later);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(window.started_at(), later);
    }

    #[test]
    fn reset_at_rounds_fractional_seconds_up() {
        let policy = RateLimitPolicy::new(5, StdDuration::from_millis(1500));
        let mut window = RateLimitWindow::open(t0());
        let decision = window.admit(&policy, t0());
        assert_eq!(decision.reset_at, t0().timestamp() + 2);
    }

    #[test]
    fn retry_after_is_at_least_one_second() {
        let policy = RateLimitPolicy::new(1, StdDuration::from_millis(1500));
        let mut window = RateLimitWindow::open(t0());
        window.admit(&policy, t0());
        let denied = window.admit(&policy, t0() + Duration::milliseconds(1499));
        assert_eq!(denied.retry_after, Some(1));
    }

    #[test]
    fn staleness_uses_window_start() {
        let window = RateLimitWindow::open(t0());
        let max_age = Duration::seconds(120);
        assert!(!window.is_stale(t0() + Duration::seconds(120), max_age));
        assert!(window.is_stale(t0() + Duration::seconds(121), max_age));
    }

    #[test]
    fn tier_namespaces_are_distinct() {
        let namespaces = [
            RateLimitTier::Authenticated.namespace(),
            RateLimitTier::Unauthenticated.namespace(),
            RateLimitTier::Login.namespace(),
        ];
        assert_ne!(namespaces[0], namespaces[1]);
        assert_ne!(namespaces[1], namespaces[2]);
        assert_ne!(namespaces[0], namespaces[2]);
    }
}
