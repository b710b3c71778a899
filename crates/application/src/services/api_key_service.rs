//! API Key Service - issuance, validation, and lifecycle of API keys

use std::sync::Arc;

use domain::{ApiKey, ApiKeyId, KNOWN_SCOPES, Scope, first_unknown};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument};

use crate::{
    credentials::{CredentialCodec, constant_time_eq},
    error::ApplicationError,
    ports::{ApiKeyStorePort, Clock},
    services::KeyUsageRecorder,
};

/// A key returned from issuance
///
/// `plaintext` is shown to the caller once and never stored.
#[derive(Debug)]
pub struct IssuedApiKey {
    /// The bearer credential
    pub plaintext: SecretString,
    /// The persisted record
    pub key: ApiKey,
}

/// Partial update of a key
#[derive(Debug, Clone, Default)]
pub struct ApiKeyUpdate {
    /// New display name
    pub name: Option<String>,
    /// New scope set, validated like on issuance
    pub scopes: Option<Vec<String>>,
}

/// Service for API key issuance and validation
pub struct ApiKeyService {
    store: Arc<dyn ApiKeyStorePort>,
    usage: KeyUsageRecorder,
    clock: Arc<dyn Clock>,
    codec: CredentialCodec,
}

impl std::fmt::Debug for ApiKeyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyService")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl ApiKeyService {
    /// Create a new API key service
    pub fn new(
        store: Arc<dyn ApiKeyStorePort>,
        usage: KeyUsageRecorder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            usage,
            clock,
            codec: CredentialCodec::api_key(),
        }
    }

    /// Issue a new key with the given scopes
    ///
    /// Every scope must be a literal member of the vocabulary; nothing is
    /// generated or persisted otherwise.
    #[instrument(skip(self, scopes), fields(scope_count = scopes.len()))]
    pub async fn issue(
        &self,
        name: &str,
        scopes: &[String],
    ) -> Result<IssuedApiKey, ApplicationError> {
        let name = validate_name(name)?;
        let scopes = validate_scopes(scopes)?;

        let generated = self.codec.generate();
        let key = ApiKey::new(
            name,
            generated.hash,
            generated.display_prefix,
            scopes,
            self.clock.now(),
        );
        self.store.insert(&key).await?;

        info!(key_id = %key.id, key_prefix = %key.key_prefix, "Issued API key");

        Ok(IssuedApiKey {
            plaintext: generated.plaintext,
            key,
        })
    }

    /// Resolve a presented credential to its active key
    ///
    /// A malformed, unknown and revoked credential all yield `Ok(None)`. The
    /// caller cannot tell a revoked key from one that never existed, so the
    /// endpoint is no oracle for enumerating keys. Store failures are
    /// returned as errors, never folded into `None`.
    #[instrument(skip_all)]
    pub async fn validate(
        &self,
        plaintext: &SecretString,
    ) -> Result<Option<ApiKey>, ApplicationError> {
        let candidate = plaintext.expose_secret();
        if !self.codec.is_well_formed(candidate) {
            debug!("Rejected malformed API key");
            return Ok(None);
        }

        let hash = CredentialCodec::hash(candidate);
        let Some(key) = self.store.find_active_by_hash(&hash).await? else {
            return Ok(None);
        };

        if !key.is_active() || !constant_time_eq(hash.as_bytes(), key.key_hash.as_bytes()) {
            return Ok(None);
        }

        self.usage.record(key.id, self.clock.now());
        Ok(Some(key))
    }

    /// List keys, newest first
    #[instrument(skip(self))]
    pub async fn list(&self, include_revoked: bool) -> Result<Vec<ApiKey>, ApplicationError> {
        self.store.list(include_revoked).await
    }

    /// Get a key by id
    #[instrument(skip(self))]
    pub async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, ApplicationError> {
        self.store.get(id).await
    }

    /// Rename a key and/or replace its scopes
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: &ApiKeyId,
        update: ApiKeyUpdate,
    ) -> Result<ApiKey, ApplicationError> {
        let name = update.name.as_deref().map(validate_name).transpose()?;
        let scopes = update.scopes.as_deref().map(validate_scopes).transpose()?;

        let mut key = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("API key {id}")))?;

        if let Some(name) = name {
            key.name = name;
        }
        if let Some(scopes) = scopes {
            key.set_scopes(scopes);
        }

        if !self.store.update(&key).await? {
            return Err(ApplicationError::NotFound(format!("API key {id}")));
        }

        info!(key_id = %key.id, "Updated API key");
        Ok(key)
    }

    /// Revoke a key
    ///
    /// Returns `false` when the key was already revoked; revocation is never
    /// undone.
    #[instrument(skip(self))]
    pub async fn revoke(&self, id: &ApiKeyId) -> Result<bool, ApplicationError> {
        if self.store.get(id).await?.is_none() {
            return Err(ApplicationError::NotFound(format!("API key {id}")));
        }

        let revoked = self.store.revoke(id, self.clock.now()).await?;
        if revoked {
            info!(key_id = %id, "Revoked API key");
        } else {
            debug!(key_id = %id, "API key was already revoked");
        }
        Ok(revoked)
    }

    /// Permanently delete a key record
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &ApiKeyId) -> Result<bool, ApplicationError> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            info!(key_id = %id, "Deleted API key");
        }
        Ok(deleted)
    }
}

fn validate_name(name: &str) -> Result<String, ApplicationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApplicationError::Validation("name must not be empty".into()));
    }
    if name.chars().count() > 100 {
        return Err(ApplicationError::Validation(
            "name must be at most 100 characters".into(),
        ));
    }
    Ok(name.to_string())
}

fn validate_scopes(scopes: &[String]) -> Result<Vec<Scope>, ApplicationError> {
    if scopes.is_empty() {
        return Err(ApplicationError::Validation(
            "at least one scope is required".into(),
        ));
    }
    if let Some(unknown) = first_unknown(scopes, KNOWN_SCOPES) {
        return Err(ApplicationError::InvalidScope(unknown.to_string()));
    }
    scopes
        .iter()
        .map(|s| Scope::parse(s).map_err(ApplicationError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::{
        ports::{ManualClock, MockApiKeyStorePort},
        services::DEFAULT_USAGE_QUEUE_CAPACITY,
        testing::InMemoryApiKeyStore,
    };

    fn scopes(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap())
    }

    fn service(store: Arc<dyn ApiKeyStorePort>, clock: ManualClock) -> ApiKeyService {
        let (usage, _handle) = KeyUsageRecorder::spawn(store.clone(), DEFAULT_USAGE_QUEUE_CAPACITY);
        ApiKeyService::new(store, usage, Arc::new(clock))
    }

    #[tokio::test]
    async fn issue_then_validate_round_trips() {
        let store = Arc::new(InMemoryApiKeyStore::default());
        let service = service(store.clone(), clock());

        let issued = service
            .issue("ci pipeline", &scopes(&["leads:read", "contacts:*"]))
            .await
            .unwrap();
        let plaintext = issued.plaintext.expose_secret();
        assert!(plaintext.starts_with(issued.key.key_prefix.trim_end_matches("...")));

        let validated = service.validate(&issued.plaintext).await.unwrap().unwrap();
        assert_eq!(validated.id, issued.key.id);
        let granted: Vec<&str> = validated.scopes.iter().map(Scope::as_str).collect();
        assert_eq!(granted, vec!["leads:read", "contacts:*"]);
    }

    #[tokio::test]
    async fn plaintext_is_never_stored() {
        let store = Arc::new(InMemoryApiKeyStore::default());
        let service = service(store.clone(), clock());
        let issued = service.issue("ci", &scopes(&["leads:read"])).await.unwrap();

        let stored = store.get(&issued.key.id).await.unwrap().unwrap();
        let plaintext = issued.plaintext.expose_secret();
        assert_ne!(stored.key_hash, *plaintext);
        assert_eq!(stored.key_hash, CredentialCodec::hash(plaintext));
        assert!(!stored.key_prefix.contains(&plaintext[12..]));
    }

    #[tokio::test]
    async fn unknown_scope_is_rejected_before_persisting() {
        let store = Arc::new(InMemoryApiKeyStore::default());
        let service = service(store.clone(), clock());

        let err = service
            .issue("ci", &scopes(&["leads:read", "deals:read"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidScope(ref s) if s == "deals:read"));
        assert!(store.keys.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_name_and_scopes_are_validation_errors() {
        let service = service(Arc::new(InMemoryApiKeyStore::default()), clock());
        assert!(matches!(
            service.issue("  ", &scopes(&["leads:read"])).await,
            Err(ApplicationError::Validation(_))
        ));
        assert!(matches!(
            service.issue("ci", &[]).await,
            Err(ApplicationError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn malformed_credentials_skip_the_store() {
        let mut mock = MockApiKeyStorePort::new();
        mock.expect_find_active_by_hash().never();
        let service = service(Arc::new(mock), clock());

        for candidate in ["", "Bearer", "oct_short", "xyz_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"] {
            let secret = SecretString::from(candidate);
            assert!(service.validate(&secret).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn unknown_key_is_none() {
        let service = service(Arc::new(InMemoryApiKeyStore::default()), clock());
        let secret = SecretString::from("oct_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
        assert!(service.validate(&secret).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_failure_is_not_folded_into_miss() {
        let mut mock = MockApiKeyStorePort::new();
        mock.expect_find_active_by_hash()
            .returning(|_| Err(ApplicationError::Storage("connection refused".into())));
        let service = service(Arc::new(mock), clock());

        let secret = SecretString::from("oct_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
        assert!(matches!(
            service.validate(&secret).await,
            Err(ApplicationError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn revocation_is_terminal() {
        let store = Arc::new(InMemoryApiKeyStore::default());
        let service = service(store, clock());
        let issued = service.issue("ci", &scopes(&["leads:read"])).await.unwrap();

        assert!(service.revoke(&issued.key.id).await.unwrap());
        assert!(service.validate(&issued.plaintext).await.unwrap().is_none());
        assert!(!service.revoke(&issued.key.id).await.unwrap());

        let stored = service.get(&issued.key.id).await.unwrap().unwrap();
        assert!(!stored.is_active());
    }

    #[tokio::test]
    async fn revoke_unknown_key_is_not_found() {
        let service = service(Arc::new(InMemoryApiKeyStore::default()), clock());
        assert!(matches!(
            service.revoke(&ApiKeyId::new()).await,
            Err(ApplicationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_revoked_keys() {
        let clock = clock();
        let service = service(Arc::new(InMemoryApiKeyStore::default()), clock.clone());
        let first = service.issue("one", &scopes(&["leads:read"])).await.unwrap();
        clock.advance(Duration::seconds(1));
        let second = service.issue("two", &scopes(&["leads:read"])).await.unwrap();
        service.revoke(&first.key.id).await.unwrap();

        let active = service.list(false).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.key.id);

        let all = service.list(true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.key.id);
    }

    #[tokio::test]
    async fn update_replaces_name_and_scopes() {
        let service = service(Arc::new(InMemoryApiKeyStore::default()), clock());
        let issued = service.issue("ci", &scopes(&["leads:read"])).await.unwrap();

        let updated = service
            .update(
                &issued.key.id,
                ApiKeyUpdate {
                    name: Some("renamed".into()),
                    scopes: Some(scopes(&["leads:*"])),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert!(updated.has_scope("leads:delete"));

        let validated = service.validate(&issued.plaintext).await.unwrap().unwrap();
        assert!(validated.has_scope("leads:write"));
    }

    #[tokio::test]
    async fn update_with_unknown_scope_changes_nothing() {
        let service = service(Arc::new(InMemoryApiKeyStore::default()), clock());
        let issued = service.issue("ci", &scopes(&["leads:read"])).await.unwrap();

        let err = service
            .update(
                &issued.key.id,
                ApiKeyUpdate {
                    name: Some("renamed".into()),
                    scopes: Some(scopes(&["leads:fly"])),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidScope(_)));
        assert_eq!(service.get(&issued.key.id).await.unwrap().unwrap().name, "ci");
    }

    #[tokio::test]
    async fn update_cannot_clear_the_scope_set() {
        let service = service(Arc::new(InMemoryApiKeyStore::default()), clock());
        let issued = service.issue("ci", &scopes(&["leads:read"])).await.unwrap();

        let err = service
            .update(
                &issued.key.id,
                ApiKeyUpdate {
                    name: None,
                    scopes: Some(Vec::new()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));

        let unchanged = service.get(&issued.key.id).await.unwrap().unwrap();
        assert!(unchanged.has_scope("leads:read"));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let service = service(Arc::new(InMemoryApiKeyStore::default()), clock());
        let issued = service.issue("ci", &scopes(&["leads:read"])).await.unwrap();

        assert!(service.delete(&issued.key.id).await.unwrap());
        assert!(!service.delete(&issued.key.id).await.unwrap());
        assert!(service.validate(&issued.plaintext).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn validation_records_last_used() {
        let store = Arc::new(InMemoryApiKeyStore::default());
        let clock = clock();
        let (usage, handle) = KeyUsageRecorder::spawn(store.clone(), 8);
        let service = ApiKeyService::new(store.clone(), usage, Arc::new(clock.clone()));

        let issued = service.issue("ci", &scopes(&["leads:read"])).await.unwrap();
        clock.advance(Duration::minutes(5));
        service.validate(&issued.plaintext).await.unwrap().unwrap();

        drop(service);
        handle.await.unwrap();

        let stored = store.get(&issued.key.id).await.unwrap().unwrap();
        assert_eq!(stored.last_used_at, Some(clock.now()));
    }
}
