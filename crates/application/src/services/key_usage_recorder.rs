//! Detached last-used recording for API keys
//!
//! Validation on the request path only enqueues a usage event; a background
//! worker owns the store write. A full queue drops the event and a failed
//! write is logged. Neither ever reaches the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::ApiKeyId;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::ports::ApiKeyStorePort;

/// Default number of queued usage events before new ones are dropped
pub const DEFAULT_USAGE_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct UsageEvent {
    key_id: ApiKeyId,
    at: DateTime<Utc>,
}

/// Handle for enqueueing last-used updates
///
/// Cloning is cheap; the worker exits once every handle is dropped and the
/// queue is drained.
#[derive(Debug, Clone)]
pub struct KeyUsageRecorder {
    sender: mpsc::Sender<UsageEvent>,
}

impl KeyUsageRecorder {
    /// Spawn the background worker on the current Tokio runtime
    pub fn spawn(store: Arc<dyn ApiKeyStorePort>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<UsageEvent>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Err(e) = store.touch_last_used(&event.key_id, event.at).await {
                    warn!(
                        key_id = %event.key_id,
                        error = %e,
                        "Failed to record API key usage"
                    );
                }
            }
            debug!("Key usage recorder stopped");
        });

        (Self { sender }, handle)
    }

    /// Enqueue a usage event without waiting
    pub fn record(&self, key_id: ApiKeyId, at: DateTime<Utc>) {
        match self.sender.try_send(UsageEvent { key_id, at }) {
            Ok(()) => {},
            Err(TrySendError::Full(event)) => {
                debug!(key_id = %event.key_id, "Usage queue full, dropping event");
            },
            Err(TrySendError::Closed(event)) => {
                debug!(key_id = %event.key_id, "Usage recorder stopped, dropping event");
            },
        }
    }
}
