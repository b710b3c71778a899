//! API key administration against the database
//!
//! Operators use these commands to bootstrap the first keys before any admin
//! session exists. They go through the same `ApiKeyService` as the HTTP
//! surface, so scope validation and hashing are identical.

use std::sync::Arc;

use anyhow::Context;
use application::{
    ApiKeyService, ApplicationError, DEFAULT_USAGE_QUEUE_CAPACITY, IssuedApiKey, KeyUsageRecorder,
    SystemClock,
};
use chrono::{DateTime, Utc};
use domain::{ApiKey, ApiKeyId};
use infrastructure::{AsyncDatabase, AsyncDatabaseConfig, DatabaseConfig, SqliteApiKeyStore};
use tokio::task::JoinHandle;
use tracing::debug;

/// Key registry bound to an open database
#[derive(Debug)]
pub struct KeyAdmin {
    service: ApiKeyService,
    usage: JoinHandle<()>,
    db: AsyncDatabase,
}

impl KeyAdmin {
    /// Open the configured database, applying pending migrations
    pub async fn open(settings: &DatabaseConfig) -> anyhow::Result<Self> {
        let db = AsyncDatabase::new(&AsyncDatabaseConfig::from_settings(settings))
            .await
            .with_context(|| format!("Failed to open database at {}", settings.path))?;
        db.migrate().await.context("Failed to apply migrations")?;
        Ok(Self::from_database(db))
    }

    /// Wrap an already-migrated database
    pub fn from_database(db: AsyncDatabase) -> Self {
        let store = Arc::new(SqliteApiKeyStore::new(db.pool().clone()));
        let (usage, handle) = KeyUsageRecorder::spawn(store.clone(), DEFAULT_USAGE_QUEUE_CAPACITY);
        let service = ApiKeyService::new(store, usage, Arc::new(SystemClock));
        Self {
            service,
            usage: handle,
            db,
        }
    }

    pub async fn issue(
        &self,
        name: &str,
        scopes: &[String],
    ) -> Result<IssuedApiKey, ApplicationError> {
        self.service.issue(name, scopes).await
    }

    pub async fn list(&self, include_revoked: bool) -> Result<Vec<ApiKey>, ApplicationError> {
        self.service.list(include_revoked).await
    }

    /// Revoke by textual id; `Ok(false)` when it was already revoked
    pub async fn revoke(&self, raw_id: &str) -> anyhow::Result<bool> {
        let id = ApiKeyId::parse(raw_id).with_context(|| format!("Invalid key id: {raw_id}"))?;
        Ok(self.service.revoke(&id).await?)
    }

    /// Flush the usage recorder and close the pool
    pub async fn close(self) {
        drop(self.service);
        if self.usage.await.is_err() {
            debug!("Usage recorder task ended abnormally");
        }
        self.db.close().await;
    }
}

fn format_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// Render keys as a fixed-width table
pub fn render_table(keys: &[ApiKey]) -> String {
    if keys.is_empty() {
        return "No API keys found.".to_string();
    }

    let rows: Vec<[String; 6]> = keys
        .iter()
        .map(|key| {
            [
                key.id.to_string(),
                key.name.clone(),
                key.key_prefix.clone(),
                key.scopes
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
                if key.is_active() { "active" } else { "revoked" }.to_string(),
                format_timestamp(key.last_used_at),
            ]
        })
        .collect();

    let header = ["ID", "NAME", "PREFIX", "SCOPES", "STATUS", "LAST USED"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[&str]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(&header);
    for row in &rows {
        out.push('\n');
        out.push_str(&line(&row.each_ref().map(String::as_str)));
    }
    out
}
