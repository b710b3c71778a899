//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod configured_principals;
mod in_memory_rate_limit;
mod password_hasher;

pub use configured_principals::ConfiguredPrincipals;
pub use in_memory_rate_limit::InMemoryRateLimitLedger;
pub use password_hasher::{PasswordHashError, PasswordHasher};
