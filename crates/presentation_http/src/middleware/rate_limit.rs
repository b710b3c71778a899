//! Throttle gate
//!
//! Counts each request against a fixed-window ledger entry derived from
//! whatever identity the request carries before any store lookup: an
//! attached credential, a well-formed bearer key (by its display prefix), a
//! well-formed session cookie (by a digest of the token), or the client
//! address. Login attempts are always counted by address. Every throttled
//! response carries the `X-RateLimit-*` headers.

use std::{
    convert::Infallible,
    future::Future,
    net::{IpAddr, SocketAddr},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use application::{CredentialCodec, RateLimitPort};
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{Extensions, HeaderMap, HeaderName, HeaderValue, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use domain::{RateLimitDecision, RateLimitTier};
use infrastructure::RateLimitConfig;
use secrecy::ExposeSecret;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::{
    api_key_auth::bearer_token,
    context::{context, context_mut},
};
use crate::error::ApiError;

/// Requests allowed in the current window
pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Requests left in the current window
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// End of the current window, Unix seconds
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Bucket shared by every request whose address cannot be determined
const UNKNOWN_CLIENT: &str = "unknown";

/// Hex digits of the token digest used to key session traffic
const SESSION_DIGEST_LEN: usize = 16;

/// How the throttle picks a tier and identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleMode {
    /// Authenticated tier when a credential is presented, anonymous otherwise
    ByAuthClass,
    /// Login tier keyed by client address
    Login,
}

/// Resolve the client address of a request
///
/// Trusted proxy headers come first in fixed order, then the socket peer.
pub fn client_ip(req: &Request) -> String {
    resolve_client_ip(req.headers(), req.extensions())
}

fn resolve_client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    forwarded_ip(headers)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |ip| ip.to_string())
}

/// Extractor for the resolved client address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_client_ip(&parts.headers, &parts.extensions)))
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header(CF_CONNECTING_IP)
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| header(X_REAL_IP).and_then(|v| v.trim().parse().ok()))
        .or_else(|| {
            header(X_FORWARDED_FOR)
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse().ok())
        })
}

/// Identity presented by the request, derived without touching any store
fn presented_identity(req: &Request, session_cookie: Option<&str>) -> Option<String> {
    if let Some(ctx) = context(req) {
        if let Some(key) = ctx.api_key() {
            return Some(format!("key:{}", key.key_prefix));
        }
        if let Some(session) = ctx.session() {
            return Some(format!("user:{}", session.user_id));
        }
    }

    if let Some(prefix) = bearer_token(req.headers())
        .and_then(|token| CredentialCodec::api_key().display_prefix(token.expose_secret()))
    {
        return Some(format!("key:{prefix}"));
    }

    let cookie_name = session_cookie?;
    let jar = CookieJar::from_headers(req.headers());
    let token = jar.get(cookie_name)?.value();
    CredentialCodec::session_token()
        .is_well_formed(token)
        .then(|| {
            let digest = CredentialCodec::hash(token);
            format!("session:{}", &digest[..SESSION_DIGEST_LEN])
        })
}

fn classify(mode: ThrottleMode, identity: Option<&str>, ip: &str) -> (RateLimitTier, String) {
    let (tier, subject) = match (mode, identity) {
        (ThrottleMode::Login, _) => (RateLimitTier::Login, ip),
        (ThrottleMode::ByAuthClass, Some(identity)) => (RateLimitTier::Authenticated, identity),
        (ThrottleMode::ByAuthClass, None) => (RateLimitTier::Unauthenticated, ip),
    };
    (tier, format!("{}:{subject}", tier.namespace()))
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(decision.reset_at));
}

/// Layer that applies request throttling
#[derive(Clone)]
pub struct ThrottleLayer {
    limiter: Arc<dyn RateLimitPort>,
    config: Arc<RateLimitConfig>,
    mode: ThrottleMode,
    session_cookie: Option<Arc<str>>,
}

impl std::fmt::Debug for ThrottleLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleLayer")
            .field("enabled", &self.config.enabled)
            .field("mode", &self.mode)
            .field("session_cookie", &self.session_cookie)
            .finish_non_exhaustive()
    }
}

impl ThrottleLayer {
    /// Create a throttle layer over the given ledger
    #[must_use]
    pub fn new(
        limiter: Arc<dyn RateLimitPort>,
        config: Arc<RateLimitConfig>,
        mode: ThrottleMode,
    ) -> Self {
        Self {
            limiter,
            config,
            mode,
            session_cookie: None,
        }
    }

    /// Also count well-formed tokens in the named session cookie as
    /// authenticated traffic
    #[must_use]
    pub fn with_session_cookie(mut self, name: &str) -> Self {
        self.session_cookie = Some(name.into());
        self
    }
}

impl<S> Layer<S> for ThrottleLayer {
    type Service = Throttle<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Throttle {
            inner,
            limiter: Arc::clone(&self.limiter),
            config: Arc::clone(&self.config),
            mode: self.mode,
            session_cookie: self.session_cookie.clone(),
        }
    }
}

/// Middleware service for request throttling
#[derive(Clone)]
pub struct Throttle<S> {
    inner: S,
    limiter: Arc<dyn RateLimitPort>,
    config: Arc<RateLimitConfig>,
    mode: ThrottleMode,
    session_cookie: Option<Arc<str>>,
}

impl<S: std::fmt::Debug> std::fmt::Debug for Throttle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("inner", &self.inner)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<S> Service<Request> for Throttle<S>
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
        let limiter = Arc::clone(&self.limiter);
        let config = Arc::clone(&self.config);
        let mode = self.mode;
        let session_cookie = self.session_cookie.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !config.enabled {
                return inner.call(req).await;
            }

            let ip = client_ip(&req);
            let identity = match mode {
                ThrottleMode::Login => None,
                ThrottleMode::ByAuthClass => presented_identity(&req, session_cookie.as_deref()),
            };
            let (tier, identifier) = classify(mode, identity.as_deref(), &ip);
            let policy = config.policy(tier);

            let decision = match limiter.check(&identifier, &policy).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(identifier = %identifier, error = %e, "Rate limit check failed, allowing request");
                    return inner.call(req).await;
                },
            };
            context_mut(&mut req).set_rate_limit_identifier(identifier.as_str());

            if !decision.allowed {
                debug!(identifier = %identifier, tier = %tier, "Rate limit exceeded");
                let mut response = ApiError::RateLimited {
                    retry_after: decision.retry_after.unwrap_or(1),
                }
                .into_response();
                apply_headers(&mut response, &decision);
                return Ok(response);
            }

            let mut response = inner.call(req).await?;
            apply_headers(&mut response, &decision);
            Ok(response)
        })
    }
}
