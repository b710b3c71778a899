//! Password hashing utilities using Argon2
//!
//! Admin passwords are stored as Argon2id PHC strings in configuration and
//! verified here at login.
//!
//! # Examples
//!
//! ```
//! use infrastructure::adapters::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("correct horse battery staple").unwrap();
//!
//! assert!(hasher.verify("correct horse battery staple", &hash).unwrap());
//! assert!(!hasher.verify("wrong password", &hash).unwrap());
//! ```

use argon2::{
    Argon2, PasswordHash, PasswordHasher as ArgonPasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur during password hashing operations
#[derive(Debug, Error)]
pub enum PasswordHashError {
    /// Failed to hash the password
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    /// Invalid hash format
    #[error("Invalid hash format: {0}")]
    InvalidHashFormat(String),
}

/// Password hasher using Argon2id with the crate's default parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    /// Create a new password hasher with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a password, returning a PHC-formatted string
    #[instrument(skip_all)]
    pub fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        debug!("Hashed password");
        Ok(hash.to_string())
    }

    /// Verify a password against a stored PHC hash
    ///
    /// Argon2 compares digests in constant time.
    #[instrument(skip_all)]
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordHashError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| PasswordHashError::InvalidHashFormat(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Check if a string looks like an Argon2 PHC hash
    #[must_use]
    pub fn is_hashed(value: &str) -> bool {
        value.starts_with("$argon2")
    }
}
