//! SQLite API key store using sqlx

use application::{error::ApplicationError, ports::ApiKeyStorePort};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{ApiKey, ApiKeyId, Scope};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::{
    error::{corrupt_row, map_sqlx_error},
    timestamp,
};

/// API key store backed by the `api_keys` table
#[derive(Debug, Clone)]
pub struct SqliteApiKeyStore {
    pool: SqlitePool,
}

impl SqliteApiKeyStore {
    /// Create a new store on an existing pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn encode_scopes(scopes: &[Scope]) -> Result<String, ApplicationError> {
        serde_json::to_string(scopes)
            .map_err(|e| ApplicationError::Internal(format!("Failed to encode scopes: {e}")))
    }
}

#[async_trait]
impl ApiKeyStorePort for SqliteApiKeyStore {
    #[instrument(skip(self, key), fields(key_id = %key.id))]
    async fn insert(&self, key: &ApiKey) -> Result<(), ApplicationError> {
        sqlx::query(
            r"
            INSERT INTO api_keys (id, name, key_hash, key_prefix, scopes, last_used_at, created_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(key.id.to_string())
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(&key.key_prefix)
        .bind(Self::encode_scopes(&key.scopes)?)
        .bind(key.last_used_at.map(timestamp::encode))
        .bind(timestamp::encode(key.created_at))
        .bind(key.revoked_at().map(timestamp::encode))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!("API key stored");
        Ok(())
    }

    #[instrument(skip(self, key_hash))]
    async fn find_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, ApplicationError> {
        let row: Option<ApiKeyRow> = sqlx::query_as(
            r"
            SELECT id, name, key_hash, key_prefix, scopes, last_used_at, created_at, revoked_at
            FROM api_keys WHERE key_hash = $1 AND revoked_at IS NULL
            ",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ApiKeyRow::into_entity).transpose()
    }

    #[instrument(skip(self), fields(key_id = %id))]
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, ApplicationError> {
        let row: Option<ApiKeyRow> = sqlx::query_as(
            r"
            SELECT id, name, key_hash, key_prefix, scopes, last_used_at, created_at, revoked_at
            FROM api_keys WHERE id = $1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(ApiKeyRow::into_entity).transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self, include_revoked: bool) -> Result<Vec<ApiKey>, ApplicationError> {
        let rows: Vec<ApiKeyRow> = sqlx::query_as(
            r"
            SELECT id, name, key_hash, key_prefix, scopes, last_used_at, created_at, revoked_at
            FROM api_keys
            WHERE $1 OR revoked_at IS NULL
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(include_revoked)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ApiKeyRow::into_entity).collect()
    }

    #[instrument(skip(self, key), fields(key_id = %key.id))]
    async fn update(&self, key: &ApiKey) -> Result<bool, ApplicationError> {
        let result = sqlx::query("UPDATE api_keys SET name = $1, scopes = $2 WHERE id = $3")
            .bind(&key.name)
            .bind(Self::encode_scopes(&key.scopes)?)
            .bind(key.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(key_id = %id))]
    async fn touch_last_used(
        &self,
        id: &ApiKeyId,
        at: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $1 WHERE id = $2")
            .bind(timestamp::encode(at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(key_id = %id))]
    async fn revoke(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<bool, ApplicationError> {
        let result =
            sqlx::query("UPDATE api_keys SET revoked_at = $1 WHERE id = $2 AND revoked_at IS NULL")
                .bind(timestamp::encode(at))
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        let revoked = result.rows_affected() > 0;
        if revoked {
            debug!("API key revoked");
        }
        Ok(revoked)
    }

    #[instrument(skip(self), fields(key_id = %id))]
    async fn delete(&self, id: &ApiKeyId) -> Result<bool, ApplicationError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

/// Row type for API key queries
#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: String,
    name: String,
    key_hash: String,
    key_prefix: String,
    scopes: String,
    last_used_at: Option<String>,
    created_at: String,
    revoked_at: Option<String>,
}

impl ApiKeyRow {
    fn into_entity(self) -> Result<ApiKey, ApplicationError> {
        let scopes: Vec<Scope> =
            serde_json::from_str(&self.scopes).map_err(|e| corrupt_row("scopes", e))?;
        let created_at = timestamp::decode("created_at", &self.created_at)?;

        let mut key = ApiKey::new(self.name, self.key_hash, self.key_prefix, scopes, created_at)
            .with_revoked_at(timestamp::decode_opt("revoked_at", self.revoked_at.as_deref())?);
        key.id = ApiKeyId::parse(&self.id).map_err(|e| corrupt_row("id", e))?;
        key.last_used_at = timestamp::decode_opt("last_used_at", self.last_used_at.as_deref())?;
        Ok(key)
    }
}
