//! SQLite session store using sqlx

use application::{error::ApplicationError, ports::SessionStorePort};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Session, SessionDuration, SessionId, SessionMetadata, UserId};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::{
    error::{corrupt_row, map_sqlx_error},
    timestamp,
};

/// Session store backed by the `sessions` table
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Create a new store on an existing pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStorePort for SqliteSessionStore {
    #[instrument(skip(self, session), fields(session_id = %session.id, user_id = %session.user_id))]
    async fn insert(&self, session: &Session) -> Result<(), ApplicationError> {
        sqlx::query(
            r"
            INSERT INTO sessions (id, user_id, token_hash, duration_class, expires_at, created_at, user_agent, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(session.id.to_string())
        .bind(session.user_id.to_string())
        .bind(&session.token_hash)
        .bind(session.duration.as_str())
        .bind(timestamp::encode(session.expires_at))
        .bind(timestamp::encode(session.created_at))
        .bind(session.metadata.user_agent.as_deref())
        .bind(session.metadata.ip_address.as_deref())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!("Session stored");
        Ok(())
    }

    #[instrument(skip(self, token_hash))]
    async fn find_valid_by_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, ApplicationError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r"
            SELECT id, user_id, token_hash, duration_class, expires_at, created_at, user_agent, ip_address
            FROM sessions WHERE token_hash = $1 AND expires_at > $2
            ",
        )
        .bind(token_hash)
        .bind(timestamp::encode(now))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(SessionRow::into_entity).transpose()
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn update_expiration(
        &self,
        id: &SessionId,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, ApplicationError> {
        let result = sqlx::query("UPDATE sessions SET expires_at = $1 WHERE id = $2")
            .bind(timestamp::encode(expires_at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn delete(&self, id: &SessionId) -> Result<bool, ApplicationError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn delete_for_user(&self, user_id: &UserId) -> Result<u64, ApplicationError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, ApplicationError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(timestamp::encode(now))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let removed = result.rows_affected();
        if removed > 0 {
            debug!(removed, "Expired sessions deleted");
        }
        Ok(removed)
    }
}

/// Row type for session queries
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    token_hash: String,
    duration_class: String,
    expires_at: String,
    created_at: String,
    user_agent: Option<String>,
    ip_address: Option<String>,
}

impl SessionRow {
    fn into_entity(self) -> Result<Session, ApplicationError> {
        Ok(Session {
            id: SessionId::parse(&self.id).map_err(|e| corrupt_row("id", e))?,
            user_id: UserId::parse(&self.user_id).map_err(|e| corrupt_row("user_id", e))?,
            token_hash: self.token_hash,
            duration: self
                .duration_class
                .parse::<SessionDuration>()
                .map_err(|e| corrupt_row("duration_class", e))?,
            expires_at: timestamp::decode("expires_at", &self.expires_at)?,
            created_at: timestamp::decode("created_at", &self.created_at)?,
            metadata: SessionMetadata {
                user_agent: self.user_agent,
                ip_address: self.ip_address,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::persistence::AsyncDatabase;

    async fn store() -> SqliteSessionStore {
        let db = AsyncDatabase::in_memory().await.unwrap();
        SqliteSessionStore::new(db.pool().clone())
    }

    fn session(user_id: UserId, hash: &str, now: DateTime<Utc>, lifetime: Duration) -> Session {
        Session::new(
            user_id,
            hash,
            SessionDuration::Standard,
            lifetime,
            now,
            SessionMetadata {
                user_agent: Some("Mozilla/5.0".to_string()),
                ip_address: Some("203.0.113.9".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn insert_and_find_by_hash() {
        let store = store().await;
        let now = Utc::now();
        let original = session(UserId::new(), "tok-1", now, Duration::hours(24));
        store.insert(&original).await.unwrap();

        let found = store.find_valid_by_hash("tok-1", now).await.unwrap().unwrap();
        assert_eq!(found.id, original.id);
        assert_eq!(found.user_id, original.user_id);
        assert_eq!(found.duration, SessionDuration::Standard);
        assert_eq!(found.metadata, original.metadata);
    }

    #[tokio::test]
    async fn expired_session_is_not_found() {
        let store = store().await;
        let now = Utc::now();
        store
            .insert(&session(UserId::new(), "tok-1", now, Duration::hours(1)))
            .await
            .unwrap();

        let later = now + Duration::hours(1);
        assert!(store.find_valid_by_hash("tok-1", later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_expiration_extends_validity() {
        let store = store().await;
        let now = Utc::now();
        let record = session(UserId::new(), "tok-1", now, Duration::hours(1));
        store.insert(&record).await.unwrap();

        assert!(store
            .update_expiration(&record.id, now + Duration::hours(5))
            .await
            .unwrap());
        let later = now + Duration::hours(2);
        assert!(store.find_valid_by_hash("tok-1", later).await.unwrap().is_some());

        assert!(!store
            .update_expiration(&SessionId::new(), now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn delete_for_user_removes_only_their_sessions() {
        let store = store().await;
        let now = Utc::now();
        let alice = UserId::new();
        let bob = UserId::new();
        store.insert(&session(alice, "a1", now, Duration::hours(1))).await.unwrap();
        store.insert(&session(alice, "a2", now, Duration::hours(1))).await.unwrap();
        store.insert(&session(bob, "b1", now, Duration::hours(1))).await.unwrap();

        assert_eq!(store.delete_for_user(&alice).await.unwrap(), 2);
        assert!(store.find_valid_by_hash("b1", now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cleanup_removes_expired_only() {
        let store = store().await;
        let now = Utc::now();
        let user = UserId::new();
        store
            .insert(&session(user, "old", now - Duration::hours(2), Duration::hours(1)))
            .await
            .unwrap();
        store.insert(&session(user, "live", now, Duration::hours(1))).await.unwrap();

        assert_eq!(store.cleanup_expired(now).await.unwrap(), 1);
        assert!(store.find_valid_by_hash("live", now).await.unwrap().is_some());
        assert_eq!(store.cleanup_expired(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_single_session() {
        let store = store().await;
        let now = Utc::now();
        let record = session(UserId::new(), "tok-1", now, Duration::hours(1));
        store.insert(&record).await.unwrap();

        assert!(store.delete(&record.id).await.unwrap());
        assert!(!store.delete(&record.id).await.unwrap());
    }
}
