//! Persistence module
//!
//! SQLite-based storage for API keys and browser sessions.

mod api_key_store;
mod async_connection;
mod error;
mod session_store;
mod timestamp;

pub use api_key_store::SqliteApiKeyStore;
pub use async_connection::{AsyncDatabase, AsyncDatabaseConfig, AsyncDatabaseError};
pub use error::map_sqlx_error;
pub use session_store::SqliteSessionStore;
