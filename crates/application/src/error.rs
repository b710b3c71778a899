//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A requested scope is not part of the vocabulary
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Input failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Email/password pair did not match a principal
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Persistence backend failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Rate-limit backend failed
    #[error("Rate limit backend error: {0}")]
    RateLimitBackend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Check if this error comes from a backend rather than from the caller
    pub const fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::RateLimitBackend(_) | Self::Internal(_)
        )
    }
}
