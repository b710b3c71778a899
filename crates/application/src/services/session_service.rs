//! Session Service - browser sessions with sliding expiration
//!
//! A session is created at login with one of two lifetime classes. Each
//! validated use close to expiry pushes the expiration forward by the
//! lifetime of the session's own class.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domain::{Principal, Session, SessionDuration, SessionId, SessionMetadata, UserId};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, instrument, warn};

use crate::{
    credentials::{CredentialCodec, constant_time_eq},
    error::ApplicationError,
    ports::{Clock, PrincipalPort, SessionStorePort},
};

/// Lifetimes of the two session classes and the refresh threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lifetime of a regular session
    pub standard: Duration,
    /// Lifetime of a "remember me" session
    pub extended: Duration,
    /// Remaining lifetime below which a session is refreshed on use
    pub refresh_threshold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            standard: Duration::hours(24),
            extended: Duration::days(30),
            refresh_threshold: Duration::hours(6),
        }
    }
}

impl SessionConfig {
    /// Lifetime granted to a session of `class`
    pub const fn lifetime(&self, class: SessionDuration) -> Duration {
        match class {
            SessionDuration::Standard => self.standard,
            SessionDuration::Extended => self.extended,
        }
    }
}

/// A session returned from creation
#[derive(Debug)]
pub struct CreatedSession {
    /// The cookie value, handed out once
    pub token: SecretString,
    /// The persisted record
    pub session: Session,
}

/// A session that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSession {
    /// Session identifier
    pub session_id: SessionId,
    /// Owning principal id
    pub user_id: UserId,
    /// Resolved principal
    pub principal: Principal,
    /// Lifetime class fixed at creation
    pub duration: SessionDuration,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Current expiration
    pub expires_at: DateTime<Utc>,
}

/// Service for browser session lifecycle
pub struct SessionService {
    store: Arc<dyn SessionStorePort>,
    principals: Arc<dyn PrincipalPort>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    codec: CredentialCodec,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionService {
    /// Create a new session service
    pub fn new(
        store: Arc<dyn SessionStorePort>,
        principals: Arc<dyn PrincipalPort>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            principals,
            clock,
            config,
            codec: CredentialCodec::session_token(),
        }
    }

    /// Session lifetimes in use
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a session for `user_id`
    #[instrument(skip(self, metadata))]
    pub async fn create(
        &self,
        user_id: UserId,
        remember_me: bool,
        metadata: SessionMetadata,
    ) -> Result<CreatedSession, ApplicationError> {
        let class = SessionDuration::from_remember_me(remember_me);
        let generated = self.codec.generate();
        let session = Session::new(
            user_id,
            generated.hash,
            class,
            self.config.lifetime(class),
            self.clock.now(),
            metadata,
        );
        self.store.insert(&session).await?;

        info!(
            session_id = %session.id,
            user_id = %user_id,
            duration = %class,
            "Created session"
        );

        Ok(CreatedSession {
            token: generated.plaintext,
            session,
        })
    }

    /// Verify an email/password pair and start a session
    ///
    /// Unknown email and wrong password both fail with
    /// [`ApplicationError::InvalidCredentials`].
    #[instrument(skip(self, password, metadata))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
        remember_me: bool,
        metadata: SessionMetadata,
    ) -> Result<(CreatedSession, Principal), ApplicationError> {
        let Some(principal) = self.principals.verify_credentials(email, password).await? else {
            info!("Login rejected");
            return Err(ApplicationError::InvalidCredentials);
        };

        let created = self.create(principal.id, remember_me, metadata).await?;
        Ok((created, principal))
    }

    /// Resolve a session token
    ///
    /// Unknown and expired tokens are indistinguishable to the caller. A
    /// session whose principal no longer exists is deleted and treated as
    /// unknown.
    #[instrument(skip_all)]
    pub async fn validate(
        &self,
        token: &SecretString,
    ) -> Result<Option<ValidatedSession>, ApplicationError> {
        let candidate = token.expose_secret();
        if !self.codec.is_well_formed(candidate) {
            return Ok(None);
        }

        let hash = CredentialCodec::hash(candidate);
        let now = self.clock.now();
        let Some(session) = self.store.find_valid_by_hash(&hash, now).await? else {
            return Ok(None);
        };
        if session.is_expired_at(now) || !constant_time_eq(hash.as_bytes(), session.token_hash.as_bytes()) {
            return Ok(None);
        }

        let Some(principal) = self.principals.get(&session.user_id).await? else {
            warn!(
                session_id = %session.id,
                user_id = %session.user_id,
                "Session principal no longer exists, removing session"
            );
            self.store.delete(&session.id).await?;
            return Ok(None);
        };

        Ok(Some(ValidatedSession {
            session_id: session.id,
            user_id: session.user_id,
            principal,
            duration: session.duration,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }))
    }

    /// Whether a session expiring at `expires_at` is due for refresh
    pub fn should_refresh(&self, expires_at: DateTime<Utc>) -> bool {
        expires_at - self.clock.now() < self.config.refresh_threshold
    }

    /// Extend a session by the lifetime of its class, returning the new expiry
    #[instrument(skip(self))]
    pub async fn refresh(
        &self,
        session_id: &SessionId,
        duration: SessionDuration,
    ) -> Result<DateTime<Utc>, ApplicationError> {
        let expires_at = self.clock.now() + self.config.lifetime(duration);
        if !self.store.update_expiration(session_id, expires_at).await? {
            return Err(ApplicationError::NotFound(format!("session {session_id}")));
        }

        debug!(session_id = %session_id, expires_at = %expires_at, "Refreshed session");
        Ok(expires_at)
    }

    /// End a session (logout)
    #[instrument(skip(self))]
    pub async fn destroy(&self, session_id: &SessionId) -> Result<bool, ApplicationError> {
        let deleted = self.store.delete(session_id).await?;
        if deleted {
            info!(session_id = %session_id, "Destroyed session");
        }
        Ok(deleted)
    }

    /// End every session of a principal
    #[instrument(skip(self))]
    pub async fn destroy_for_user(&self, user_id: &UserId) -> Result<u64, ApplicationError> {
        let removed = self.store.delete_for_user(user_id).await?;
        info!(user_id = %user_id, removed, "Destroyed sessions for principal");
        Ok(removed)
    }

    /// Delete every expired session
    #[instrument(skip(self))]
    pub async fn cleanup_expired(&self) -> Result<u64, ApplicationError> {
        self.store.cleanup_expired(self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        ports::{ManualClock, MockSessionStorePort},
        testing::{InMemorySessionStore, StaticPrincipals},
    };

    struct Fixture {
        service: SessionService,
        store: Arc<InMemorySessionStore>,
        principals: Arc<StaticPrincipals>,
        clock: ManualClock,
        principal: Principal,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        let principal = Principal::new(UserId::new(), "admin@example.com", "Admin");
        let principals = StaticPrincipals::with(principal.clone(), "correct horse");
        let store = Arc::new(InMemorySessionStore::default());
        let service = SessionService::new(
            store.clone(),
            principals.clone(),
            Arc::new(clock.clone()),
            SessionConfig::default(),
        );
        Fixture {
            service,
            store,
            principals,
            clock,
            principal,
        }
    }

    #[tokio::test]
    async fn create_uses_class_lifetime() {
        let f = fixture();
        let now = f.clock.now();

        let standard = f
            .service
            .create(f.principal.id, false, SessionMetadata::default())
            .await
            .unwrap();
        assert_eq!(standard.session.expires_at, now + Duration::hours(24));
        assert_eq!(standard.session.duration, SessionDuration::Standard);

        let extended = f
            .service
            .create(f.principal.id, true, SessionMetadata::default())
            .await
            .unwrap();
        assert_eq!(extended.session.expires_at, now + Duration::days(30));
        assert_eq!(extended.session.duration, SessionDuration::Extended);
    }

    #[tokio::test]
    async fn token_is_stored_only_as_digest() {
        let f = fixture();
        let created = f
            .service
            .create(f.principal.id, false, SessionMetadata::default())
            .await
            .unwrap();

        let stored = f.store.sessions.lock().get(&created.session.id).cloned().unwrap();
        assert_eq!(stored.token_hash, CredentialCodec::hash(created.token.expose_secret()));
    }

    #[tokio::test]
    async fn validate_resolves_principal() {
        let f = fixture();
        let created = f
            .service
            .create(f.principal.id, false, SessionMetadata::default())
            .await
            .unwrap();

        let validated = f.service.validate(&created.token).await.unwrap().unwrap();
        assert_eq!(validated.session_id, created.session.id);
        assert_eq!(validated.principal, f.principal);
        assert_eq!(validated.expires_at, created.session.expires_at);
    }

    #[tokio::test]
    async fn expired_session_is_indistinguishable_from_unknown() {
        let f = fixture();
        let created = f
            .service
            .create(f.principal.id, false, SessionMetadata::default())
            .await
            .unwrap();

        f.clock.advance(Duration::hours(24));
        assert!(f.service.validate(&created.token).await.unwrap().is_none());

        let unknown = CredentialCodec::session_token().generate();
        assert!(f.service.validate(&unknown.plaintext).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_token_skips_store() {
        let mut store = MockSessionStorePort::new();
        store.expect_find_valid_by_hash().never();
        let service = SessionService::new(
            Arc::new(store),
            Arc::new(StaticPrincipals::default()),
            Arc::new(ManualClock::new(Utc::now())),
            SessionConfig::default(),
        );

        let token = SecretString::from("oct_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
        assert!(service.validate(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let mut store = MockSessionStorePort::new();
        store
            .expect_find_valid_by_hash()
            .returning(|_, _| Err(ApplicationError::Storage("database is locked".into())));
        let service = SessionService::new(
            Arc::new(store),
            Arc::new(StaticPrincipals::default()),
            Arc::new(ManualClock::new(Utc::now())),
            SessionConfig::default(),
        );

        let token = CredentialCodec::session_token().generate();
        assert!(matches!(
            service.validate(&token.plaintext).await,
            Err(ApplicationError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn should_refresh_is_threshold_based() {
        let f = fixture();
        let now = f.clock.now();
        assert!(!f.service.should_refresh(now + Duration::hours(7)));
        assert!(!f.service.should_refresh(now + Duration::hours(6)));
        assert!(f.service.should_refresh(now + Duration::hours(6) - Duration::seconds(1)));
        assert!(f.service.should_refresh(now));
    }

    #[tokio::test]
    async fn sliding_expiration_extends_only_near_expiry() {
        let f = fixture();
        let created = f
            .service
            .create(f.principal.id, false, SessionMetadata::default())
            .await
            .unwrap();
        let original = created.session.expires_at;

        f.clock.advance(Duration::hours(2));
        let early = f.service.validate(&created.token).await.unwrap().unwrap();
        assert!(!f.service.should_refresh(early.expires_at));
        assert_eq!(early.expires_at, original);

        f.clock.advance(Duration::hours(17));
        let late = f.service.validate(&created.token).await.unwrap().unwrap();
        assert!(f.service.should_refresh(late.expires_at));
        let refreshed = f.service.refresh(&late.session_id, late.duration).await.unwrap();
        assert!(refreshed > original);

        let again = f.service.validate(&created.token).await.unwrap().unwrap();
        assert_eq!(again.expires_at, refreshed);
    }

    #[tokio::test]
    async fn refresh_keeps_duration_class() {
        let f = fixture();
        let created = f
            .service
            .create(f.principal.id, false, SessionMetadata::default())
            .await
            .unwrap();

        f.clock.advance(Duration::hours(20));
        let refreshed = f
            .service
            .refresh(&created.session.id, created.session.duration)
            .await
            .unwrap();
        assert_eq!(refreshed, f.clock.now() + Duration::hours(24));
    }

    #[tokio::test]
    async fn refresh_of_missing_session_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.service.refresh(&SessionId::new(), SessionDuration::Standard).await,
            Err(ApplicationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn destroy_logs_out() {
        let f = fixture();
        let created = f
            .service
            .create(f.principal.id, false, SessionMetadata::default())
            .await
            .unwrap();

        assert!(f.service.destroy(&created.session.id).await.unwrap());
        assert!(f.service.validate(&created.token).await.unwrap().is_none());
        assert!(!f.service.destroy(&created.session.id).await.unwrap());
    }

    #[tokio::test]
    async fn removed_principal_cascades_to_session() {
        let f = fixture();
        let created = f
            .service
            .create(f.principal.id, false, SessionMetadata::default())
            .await
            .unwrap();

        f.principals.remove(&f.principal.id);
        assert!(f.service.validate(&created.token).await.unwrap().is_none());
        assert!(f.store.sessions.lock().is_empty());
    }

    #[tokio::test]
    async fn destroy_for_user_removes_all_sessions() {
        let f = fixture();
        for remember_me in [false, true] {
            f.service
                .create(f.principal.id, remember_me, SessionMetadata::default())
                .await
                .unwrap();
        }
        assert_eq!(f.service.destroy_for_user(&f.principal.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let f = fixture();
        let (created, principal) = f
            .service
            .login(
                "Admin@Example.com",
                &SecretString::from("correct horse"),
                true,
                SessionMetadata::default(),
            )
            .await
            .unwrap();
        assert_eq!(principal.id, f.principal.id);
        assert_eq!(created.session.duration, SessionDuration::Extended);

        let err = f
            .service
            .login(
                "admin@example.com",
                &SecretString::from("wrong"),
                false,
                SessionMetadata::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidCredentials));
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired() {
        let f = fixture();
        f.service
            .create(f.principal.id, false, SessionMetadata::default())
            .await
            .unwrap();
        f.service
            .create(f.principal.id, true, SessionMetadata::default())
            .await
            .unwrap();

        f.clock.advance(Duration::days(2));
        assert_eq!(f.service.cleanup_expired().await.unwrap(), 1);
        assert_eq!(f.store.sessions.lock().len(), 1);
    }
}
