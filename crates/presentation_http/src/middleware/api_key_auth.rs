//! API key gate and scope enforcement
//!
//! Validates `Authorization: Bearer <key>` against the key registry and
//! attaches the verified key to the [`RequestContext`]. The required variant
//! rejects absent or invalid credentials; the optional variant lets them
//! through unauthenticated. Registry failures are never folded into
//! "invalid": they surface as internal errors in both variants.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use application::ApiKeyService;
use axum::{
    extract::Request,
    http::{HeaderMap, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::{
    AuthMode,
    context::{context, context_mut},
};
use crate::error::ApiError;

/// Extract the bearer token from the authorization header
///
/// The scheme is matched case-insensitively.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<SecretString> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| SecretString::from(token.to_owned()))
}

/// Layer that applies API key authentication
#[derive(Clone)]
pub struct ApiKeyAuthLayer {
    service: Arc<ApiKeyService>,
    mode: AuthMode,
}

impl std::fmt::Debug for ApiKeyAuthLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuthLayer")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ApiKeyAuthLayer {
    /// Reject requests without a valid key
    #[must_use]
    pub fn required(service: Arc<ApiKeyService>) -> Self {
        Self::new(service, AuthMode::Required)
    }

    /// Attach a valid key when present, never reject for its absence
    #[must_use]
    pub fn optional(service: Arc<ApiKeyService>) -> Self {
        Self::new(service, AuthMode::Optional)
    }

    fn new(service: Arc<ApiKeyService>, mode: AuthMode) -> Self {
        Self { service, mode }
    }
}

impl<S> Layer<S> for ApiKeyAuthLayer {
    type Service = ApiKeyAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiKeyAuth {
            inner,
            service: Arc::clone(&self.service),
            mode: self.mode,
        }
    }
}

/// Middleware service for API key authentication
#[derive(Clone)]
pub struct ApiKeyAuth<S> {
    inner: S,
    service: Arc<ApiKeyService>,
    mode: AuthMode,
}

impl<S: std::fmt::Debug> std::fmt::Debug for ApiKeyAuth<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("inner", &self.inner)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<S> Service<Request> for ApiKeyAuth<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let service = Arc::clone(&self.service);
        let mode = self.mode;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // An earlier optional gate already verified this request's key
            if context(&req).is_some_and(|ctx| ctx.api_key().is_some()) {
                return inner.call(req).await;
            }

            let Some(token) = bearer_token(req.headers()) else {
                return match mode {
                    AuthMode::Required => Ok(ApiError::MissingCredential.into_response()),
                    AuthMode::Optional => inner.call(req).await,
                };
            };

            match service.validate(&token).await {
                Ok(Some(key)) => {
                    debug!(key_prefix = %key.key_prefix, "API key verified");
                    context_mut(&mut req).set_api_key(key);
                    inner.call(req).await
                },
                Ok(None) => match mode {
                    AuthMode::Required => Ok(ApiError::InvalidCredential.into_response()),
                    AuthMode::Optional => inner.call(req).await,
                },
                Err(e) => {
                    warn!(error = %e, "API key lookup failed");
                    Ok(ApiError::from(e).into_response())
                },
            }
        })
    }
}

/// Layer that requires the attached API key to grant a scope
///
/// Must run after an [`ApiKeyAuthLayer`]. With no key attached it rejects
/// the request instead of letting it through.
#[derive(Debug, Clone)]
pub struct RequireScopeLayer {
    scope: Arc<str>,
}

impl RequireScopeLayer {
    /// Require `scope` on every request through this layer
    #[must_use]
    pub fn new(scope: impl Into<Arc<str>>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

impl<S> Layer<S> for RequireScopeLayer {
    type Service = RequireScope<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireScope {
            inner,
            scope: Arc::clone(&self.scope),
        }
    }
}

/// Middleware service for scope enforcement
#[derive(Debug, Clone)]
pub struct RequireScope<S> {
    inner: S,
    scope: Arc<str>,
}

impl<S> Service<Request> for RequireScope<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let scope = Arc::clone(&self.scope);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(key) = context(&req).and_then(|ctx| ctx.api_key()) else {
                warn!(scope = %scope, "Scope check reached without an authenticated key");
                return Ok(ApiError::MissingCredential.into_response());
            };

            if !key.has_scope(&scope) {
                debug!(key_prefix = %key.key_prefix, scope = %scope, "Insufficient scope");
                return Ok(ApiError::InsufficientScope(scope.to_string()).into_response());
            }

            inner.call(req).await
        })
    }
}
