//! Expired session cleanup task
//!
//! Expired sessions are already rejected on validation; this task only
//! reclaims their rows.

use std::{sync::Arc, time::Duration};

use application::SessionService;
use tracing::{debug, error, info};

/// Spawn a background task that periodically deletes expired sessions.
///
/// Returns a `JoinHandle` that can be used to abort the task when shutting
/// down.
pub fn spawn_session_cleanup_task(
    sessions: Arc<SessionService>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    info!(
        interval_secs = interval.as_secs(),
        "Starting session cleanup task"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Don't run immediately on startup
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match sessions.cleanup_expired().await {
                Ok(removed) => {
                    if removed > 0 {
                        info!(removed_count = removed, "Cleaned up expired sessions");
                    } else {
                        debug!("No expired sessions to clean up");
                    }
                },
                Err(e) => {
                    error!(error = %e, "Failed to clean up expired sessions");
                },
            }
        }
    })
}
