//! Application state shared across handlers

use std::sync::Arc;

use application::{
    ApiKeyService, ApplicationError, Clock, DEFAULT_USAGE_QUEUE_CAPACITY, KeyUsageRecorder,
    RateLimitPort, SessionService,
};
use infrastructure::{
    AppConfig, AsyncDatabase, ConfiguredPrincipals, InMemoryRateLimitLedger, SqliteApiKeyStore,
    SqliteSessionStore,
};
use tokio::task::JoinHandle;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// API key registry
    pub api_keys: Arc<ApiKeyService>,
    /// Session store
    pub sessions: Arc<SessionService>,
    /// Request ledger used by the throttle gates
    pub rate_limiter: Arc<dyn RateLimitPort>,
    /// Application configuration
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("api_keys", &self.api_keys)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire services to the SQLite stores and the in-memory ledger
    ///
    /// Also spawns the last-used recorder; its handle is returned so the
    /// caller can await the drain on shutdown.
    pub fn build(
        config: AppConfig,
        db: &AsyncDatabase,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, JoinHandle<()>), ApplicationError> {
        let principals = ConfiguredPrincipals::from_config(&config.admin_users)?;
        info!(admin_users = principals.len(), "Loaded admin principals");

        let key_store = Arc::new(SqliteApiKeyStore::new(db.pool().clone()));
        let (usage, usage_handle) =
            KeyUsageRecorder::spawn(key_store.clone(), DEFAULT_USAGE_QUEUE_CAPACITY);

        let api_keys = Arc::new(ApiKeyService::new(key_store, usage, Arc::clone(&clock)));
        let sessions = Arc::new(SessionService::new(
            Arc::new(SqliteSessionStore::new(db.pool().clone())),
            Arc::new(principals),
            Arc::clone(&clock),
            config.session.lifetimes(),
        ));
        let rate_limiter: Arc<dyn RateLimitPort> = Arc::new(InMemoryRateLimitLedger::new(clock));

        Ok((
            Self {
                api_keys,
                sessions,
                rate_limiter,
                config: Arc::new(config),
            },
            usage_handle,
        ))
    }
}
