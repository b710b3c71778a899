//! Session gate
//!
//! Reads the session cookie, validates it and attaches the session to the
//! [`RequestContext`]. A session close to expiry is refreshed and the
//! refreshed cookie is sent with the response. On rejection the required
//! variant also clears the cookie so the browser stops sending it.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use application::SessionService;
use axum::{
    extract::Request,
    http::{HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use super::{
    AuthMode,
    context::{context, context_mut},
};
use crate::error::ApiError;

/// Build a `Set-Cookie` value for the session token
pub fn session_cookie(name: &str, token: &str, max_age_secs: i64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{name}={token}; HttpOnly{secure}; SameSite=Strict; Path=/; Max-Age={}",
        max_age_secs.max(0)
    )
}

/// Build a `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}

/// Append a `Set-Cookie` header, logging instead of panicking on bad bytes
pub(crate) fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        },
        Err(e) => error!(error = %e, "Refusing to emit malformed Set-Cookie header"),
    }
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .any(|v| v.to_str().is_ok_and(|s| s.starts_with(&prefix)))
}

/// Layer that applies session authentication
#[derive(Clone)]
pub struct SessionAuthLayer {
    sessions: Arc<SessionService>,
    cookie_name: Arc<str>,
    secure: bool,
    mode: AuthMode,
}

impl std::fmt::Debug for SessionAuthLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthLayer")
            .field("cookie_name", &self.cookie_name)
            .field("secure", &self.secure)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl SessionAuthLayer {
    /// Reject requests without a valid session
    #[must_use]
    pub fn required(sessions: Arc<SessionService>, cookie_name: &str, secure: bool) -> Self {
        Self::new(sessions, cookie_name, secure, AuthMode::Required)
    }

    /// Attach a valid session when present, never reject for its absence
    #[must_use]
    pub fn optional(sessions: Arc<SessionService>, cookie_name: &str, secure: bool) -> Self {
        Self::new(sessions, cookie_name, secure, AuthMode::Optional)
    }

    fn new(sessions: Arc<SessionService>, cookie_name: &str, secure: bool, mode: AuthMode) -> Self {
        Self {
            sessions,
            cookie_name: cookie_name.into(),
            secure,
            mode,
        }
    }
}

impl<S> Layer<S> for SessionAuthLayer {
    type Service = SessionAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionAuth {
            inner,
            sessions: Arc::clone(&self.sessions),
            cookie_name: Arc::clone(&self.cookie_name),
            secure: self.secure,
            mode: self.mode,
        }
    }
}

/// Middleware service for session authentication
#[derive(Clone)]
pub struct SessionAuth<S> {
    inner: S,
    sessions: Arc<SessionService>,
    cookie_name: Arc<str>,
    secure: bool,
    mode: AuthMode,
}

impl<S: std::fmt::Debug> std::fmt::Debug for SessionAuth<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuth")
            .field("inner", &self.inner)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn reject(cookie_name: &str, secure: bool, had_cookie: bool) -> Response {
    let mut response = ApiError::unauthorized().into_response();
    if had_cookie {
        append_cookie(&mut response, &clear_session_cookie(cookie_name, secure));
    }
    response
}

impl<S> Service<Request> for SessionAuth<S>
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
        let sessions = Arc::clone(&self.sessions);
        let cookie_name = Arc::clone(&self.cookie_name);
        let secure = self.secure;
        let mode = self.mode;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // An earlier optional gate already verified this request's session
            if context(&req).is_some_and(|ctx| ctx.session().is_some()) {
                return inner.call(req).await;
            }

            let token = CookieJar::from_headers(req.headers())
                .get(&cookie_name)
                .map(|c| c.value().to_owned())
                .filter(|v| !v.is_empty())
                .map(SecretString::from);

            let Some(token) = token else {
                return match mode {
                    AuthMode::Required => Ok(reject(&cookie_name, secure, false)),
                    AuthMode::Optional => inner.call(req).await,
                };
            };

            let session = match sessions.validate(&token).await {
                Ok(Some(session)) => session,
                Ok(None) => {
                    debug!("Session cookie rejected");
                    return match mode {
                        AuthMode::Required => Ok(reject(&cookie_name, secure, true)),
                        AuthMode::Optional => inner.call(req).await,
                    };
                },
                Err(e) => {
                    warn!(error = %e, "Session lookup failed");
                    return Ok(ApiError::from(e).into_response());
                },
            };

            let refreshed: Option<DateTime<Utc>> = if sessions.should_refresh(session.expires_at) {
                match sessions.refresh(&session.session_id, session.duration).await {
                    Ok(expires_at) => Some(expires_at),
                    Err(e) => {
                        warn!(session_id = %session.session_id, error = %e, "Session refresh failed");
                        return Ok(ApiError::from(e).into_response());
                    },
                }
            } else {
                None
            };

            let max_age = sessions.config().lifetime(session.duration).num_seconds();
            let ctx = context_mut(&mut req);
            ctx.set_session(session);
            if let Some(expires_at) = refreshed {
                ctx.set_session_expiry(expires_at);
            }

            let mut response = inner.call(req).await?;

            // A handler that set its own cookie (logout) takes precedence
            if refreshed.is_some() && !sets_cookie(&response, &cookie_name) {
                let cookie = session_cookie(&cookie_name, token.expose_secret(), max_age, secure);
                append_cookie(&mut response, &cookie);
            }

            Ok(response)
        })
    }
}
