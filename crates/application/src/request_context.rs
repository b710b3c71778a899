//! Request context for propagating authentication and request metadata
//!
//! The HTTP gates populate a `RequestContext` per request: the verified API
//! key and/or session, and the identifier the throttle counted the request
//! under. Handlers read it to branch on authentication state.
//!
//! # Examples
//!
//! ```
//! use application::RequestContext;
//!
//! let ctx = RequestContext::new();
//!
//! assert!(!ctx.is_authenticated());
//! assert!(!ctx.has_current_scope("leads:read"));
//! assert!(!ctx.request_id().is_nil());
//! ```

use chrono::{DateTime, Utc};
use domain::ApiKey;
use uuid::Uuid;

use crate::services::ValidatedSession;

/// Context for a single request, carrying authentication and metadata
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    timestamp: DateTime<Utc>,
    api_key: Option<ApiKey>,
    session: Option<ValidatedSession>,
    rate_limit_identifier: Option<String>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Create an unauthenticated context with a fresh request id
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(Uuid::now_v7())
    }

    /// Create an unauthenticated context with a specific request id
    ///
    /// Used when the id is supplied by an upstream proxy.
    #[must_use]
    pub fn with_request_id(request_id: Uuid) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
            api_key: None,
            session: None,
            rate_limit_identifier: None,
        }
    }

    /// Get the unique request identifier
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Get the timestamp when the request was received
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The verified API key, if the request carried one
    #[must_use]
    pub const fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }

    /// The verified session, if the request carried one
    #[must_use]
    pub const fn session(&self) -> Option<&ValidatedSession> {
        self.session.as_ref()
    }

    /// Identifier the throttle counted this request under
    #[must_use]
    pub fn rate_limit_identifier(&self) -> Option<&str> {
        self.rate_limit_identifier.as_deref()
    }

    /// Whether any credential was verified
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.api_key.is_some() || self.session.is_some()
    }

    /// Whether the attached API key grants `required`
    ///
    /// `false` when no key is attached.
    #[must_use]
    pub fn has_current_scope(&self, required: &str) -> bool {
        self.api_key.as_ref().is_some_and(|key| key.has_scope(required))
    }

    /// Attach a verified API key
    pub fn set_api_key(&mut self, key: ApiKey) {
        self.api_key = Some(key);
    }

    /// Attach a verified session
    pub fn set_session(&mut self, session: ValidatedSession) {
        self.session = Some(session);
    }

    /// Replace the attached session's expiration after a refresh
    pub fn set_session_expiry(&mut self, expires_at: DateTime<Utc>) {
        if let Some(session) = self.session.as_mut() {
            session.expires_at = expires_at;
        }
    }

    /// Record the throttle identifier
    pub fn set_rate_limit_identifier(&mut self, identifier: impl Into<String>) {
        self.rate_limit_identifier = Some(identifier.into());
    }
}
