//! Infrastructure layer - Adapters for external systems
//!
//! Implements the ports defined in the application layer: SQLite stores for
//! credentials, the in-memory rate-limit ledger, configured principals with
//! Argon2 password verification, configuration loading and tracing setup.

pub mod adapters;
pub mod config;
pub mod persistence;
pub mod telemetry;

pub use adapters::*;
pub use config::{
    AdminUserEntry, AppConfig, CsrfConfig, DatabaseConfig, RateLimitConfig, ServerConfig,
    SessionAppConfig, TierConfig,
};
pub use persistence::{
    AsyncDatabase, AsyncDatabaseConfig, AsyncDatabaseError, SqliteApiKeyStore, SqliteSessionStore,
};
pub use telemetry::{LogFormat, TelemetryError, init_tracing};
