//! Application services - Use case implementations

mod api_key_service;
mod key_usage_recorder;
mod session_service;

pub use api_key_service::{ApiKeyService, ApiKeyUpdate, IssuedApiKey};
pub use key_usage_recorder::{DEFAULT_USAGE_QUEUE_CAPACITY, KeyUsageRecorder};
pub use session_service::{CreatedSession, SessionConfig, SessionService, ValidatedSession};
