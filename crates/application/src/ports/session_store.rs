//! Port for session persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Session, SessionId, UserId};

#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for storing browser sessions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStorePort: Send + Sync {
    /// Persist a new session
    async fn insert(&self, session: &Session) -> Result<(), ApplicationError>;

    /// Look up a session by token digest that has not expired at `now`
    async fn find_valid_by_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, ApplicationError>;

    /// Move a session's expiration
    async fn update_expiration(
        &self,
        id: &SessionId,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, ApplicationError>;

    /// Delete one session
    async fn delete(&self, id: &SessionId) -> Result<bool, ApplicationError>;

    /// Delete every session of a principal, returning how many were removed
    async fn delete_for_user(&self, user_id: &UserId) -> Result<u64, ApplicationError>;

    /// Delete sessions that expired at or before `now`
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, ApplicationError>;
}
