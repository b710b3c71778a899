//! Request context seeding
//!
//! Extracts or generates a request id for each incoming request, seeds an
//! unauthenticated [`RequestContext`] for the gates to fill in, and opens the
//! `http_request` span used for log correlation.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use application::RequestContext;
use axum::{body::Body, extract::Request, http::header::HeaderValue, response::Response};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// The header name for the request ID
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Layer that seeds the per-request context
#[derive(Debug, Clone, Default)]
pub struct RequestContextLayer;

impl RequestContextLayer {
    /// Create a new request context layer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextService { inner }
    }
}

/// Service that attaches a request id and an empty [`RequestContext`]
#[derive(Debug, Clone)]
pub struct RequestContextService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestContextService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::now_v7);

        request.extensions_mut().insert(RequestId(request_id));
        request
            .extensions_mut()
            .insert(RequestContext::with_request_id(request_id));

        let span = tracing::info_span!(
            "http_request",
            request_id = %request_id,
            method = %request.method(),
            uri = %request.uri().path(),
        );

        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let mut response = inner.call(request).await?;

                if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}

/// Request ID extracted from the request headers or generated
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutable access to the request's context, seeding one if no layer did
///
/// Gates call this so they also work when mounted without
/// [`RequestContextLayer`], as in unit tests.
pub(crate) fn context_mut(req: &mut Request) -> &mut RequestContext {
    let request_id = req.extensions().get::<RequestId>().map(|id| id.0);
    req.extensions_mut().get_or_insert_with(|| {
        request_id.map_or_else(RequestContext::new, RequestContext::with_request_id)
    })
}

/// Read-only access to the request's context, if seeded
pub(crate) fn context(req: &Request) -> Option<&RequestContext> {
    req.extensions().get::<RequestContext>()
}
