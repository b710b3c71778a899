//! Rate limit ledger sweep task
//!
//! Periodically drops ledger windows that started long enough ago that they
//! can no longer affect a decision. Runs on its own timer, off the request
//! path, through the same port the throttle uses.

use std::{sync::Arc, time::Duration};

use application::RateLimitPort;
use tracing::{debug, error, info};

/// Spawn a background task that periodically sweeps stale ledger entries.
///
/// Windows that started more than `stale_after` ago are removed every
/// `interval`. Returns a `JoinHandle` that can be used to abort the task when
/// shutting down.
pub fn spawn_rate_limit_cleanup_task(
    limiter: Arc<dyn RateLimitPort>,
    stale_after: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let max_age = chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::MAX);

    info!(
        stale_after_secs = stale_after.as_secs(),
        interval_secs = interval.as_secs(),
        "Starting rate limit cleanup task"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Don't run immediately on startup
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match limiter.purge_stale(max_age).await {
                Ok(removed) if removed > 0 => {
                    debug!(removed_count = removed, "Swept stale rate limit windows");
                },
                Ok(_) => {},
                Err(e) => {
                    error!(error = %e, "Failed to sweep rate limit windows");
                },
            }
        }
    })
}
