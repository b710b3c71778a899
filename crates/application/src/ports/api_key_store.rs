//! Port for API key persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{ApiKey, ApiKeyId};

#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for storing API key records
///
/// Records are addressed by id, or by the digest of their credential for
/// validation. The plaintext credential never reaches this port.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApiKeyStorePort: Send + Sync {
    /// Persist a newly issued key
    async fn insert(&self, key: &ApiKey) -> Result<(), ApplicationError>;

    /// Look up a non-revoked key by credential digest
    async fn find_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, ApplicationError>;

    /// Get a key by id, revoked or not
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, ApplicationError>;

    /// List keys, newest first
    async fn list(&self, include_revoked: bool) -> Result<Vec<ApiKey>, ApplicationError>;

    /// Persist name and scope changes
    ///
    /// Returns `false` if no record has this id.
    async fn update(&self, key: &ApiKey) -> Result<bool, ApplicationError>;

    /// Record a successful validation
    async fn touch_last_used(
        &self,
        id: &ApiKeyId,
        at: DateTime<Utc>,
    ) -> Result<(), ApplicationError>;

    /// Mark a key revoked if it is not already
    ///
    /// Returns `true` only when this call performed the revocation.
    async fn revoke(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<bool, ApplicationError>;

    /// Remove a key record entirely
    async fn delete(&self, id: &ApiKeyId) -> Result<bool, ApplicationError>;
}
