//! Fixtures shared by middleware and handler tests

use std::sync::{Arc, OnceLock};

use application::{
    ApiKeyService, ApiKeyStorePort, ApplicationError, ManualClock, SessionService,
};
use async_trait::async_trait;
use axum::{body::to_bytes, response::Response};
use chrono::{DateTime, TimeZone, Utc};
use domain::{ApiKey, ApiKeyId, SessionMetadata};
use infrastructure::{AdminUserEntry, AppConfig, AsyncDatabase, PasswordHasher};
use mockall::mock;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::{
    middleware::{AuthMode, SessionAuthLayer},
    state::AppState,
};

pub const ADMIN_ID: &str = "018f2c3e-7b1a-7c00-9a44-2b3c4d5e6f70";
pub const ADMIN_EMAIL: &str = "ops@octocrm.test";
pub const ADMIN_PASSWORD: &str = "correct horse battery";
pub const COOKIE_NAME: &str = "octocrm_session";

fn admin_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| PasswordHasher::new().hash(ADMIN_PASSWORD).unwrap())
}

/// Configuration with one admin user and non-`Secure` cookies
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.session.secure_cookie = false;
    config.admin_users = vec![AdminUserEntry {
        id: ADMIN_ID.to_string(),
        email: ADMIN_EMAIL.to_string(),
        display_name: "Ops".to_string(),
        password_hash: admin_hash().to_string(),
    }];
    config
}

/// Services on an in-memory database with a manual clock
pub struct TestHarness {
    pub state: AppState,
    pub clock: ManualClock,
    _db: AsyncDatabase,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let db = AsyncDatabase::in_memory().await.unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap());
        let (state, _usage) = AppState::build(config, &db, Arc::new(clock.clone())).unwrap();
        Self {
            state,
            clock,
            _db: db,
        }
    }

    pub fn api_keys(&self) -> Arc<ApiKeyService> {
        Arc::clone(&self.state.api_keys)
    }

    pub fn sessions(&self) -> Arc<SessionService> {
        Arc::clone(&self.state.sessions)
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        application::Clock::now(&self.clock)
    }

    pub fn session_layer(&self, mode: AuthMode) -> SessionAuthLayer {
        match mode {
            AuthMode::Required => SessionAuthLayer::required(self.sessions(), COOKIE_NAME, false),
            AuthMode::Optional => SessionAuthLayer::optional(self.sessions(), COOKIE_NAME, false),
        }
    }

    /// Issue a key and return its plaintext and id
    pub async fn issue_key(&self, name: &str, scopes: &[&str]) -> (String, ApiKeyId) {
        let scopes: Vec<String> = scopes.iter().map(ToString::to_string).collect();
        let issued = self.state.api_keys.issue(name, &scopes).await.unwrap();
        (issued.plaintext.expose_secret().to_string(), issued.key.id)
    }

    /// Log the admin in and return the session token
    pub async fn login(&self, remember_me: bool) -> String {
        let (created, _) = self
            .state
            .sessions
            .login(
                ADMIN_EMAIL,
                &SecretString::from(ADMIN_PASSWORD),
                remember_me,
                SessionMetadata::default(),
            )
            .await
            .unwrap();
        created.token.expose_secret().to_string()
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

mock! {
    pub ApiKeyStore {}

    #[async_trait]
    impl ApiKeyStorePort for ApiKeyStore {
        async fn insert(&self, key: &ApiKey) -> Result<(), ApplicationError>;
        async fn find_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, ApplicationError>;
        async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, ApplicationError>;
        async fn list(&self, include_revoked: bool) -> Result<Vec<ApiKey>, ApplicationError>;
        async fn update(&self, key: &ApiKey) -> Result<bool, ApplicationError>;
        async fn touch_last_used(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), ApplicationError>;
        async fn revoke(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<bool, ApplicationError>;
        async fn delete(&self, id: &ApiKeyId) -> Result<bool, ApplicationError>;
    }
}
