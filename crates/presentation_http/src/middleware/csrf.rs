//! CSRF guard
//!
//! State-changing requests must carry a fixed marker header with the exact
//! configured value. Read-class methods and preflight requests pass
//! unchecked. A missing header and a wrong value are rejected the same way.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use application::{ApplicationError, constant_time_eq};
use axum::{
    extract::Request,
    http::{HeaderName, Method},
    response::{IntoResponse, Response},
};
use infrastructure::CsrfConfig;
use tower::{Layer, Service};
use tracing::debug;

use crate::error::ApiError;

fn is_read_class(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Layer that applies the CSRF marker check
#[derive(Debug, Clone)]
pub struct CsrfLayer {
    header_name: HeaderName,
    expected_value: Arc<str>,
}

impl CsrfLayer {
    /// Create a guard from configuration
    pub fn from_config(config: &CsrfConfig) -> Result<Self, ApplicationError> {
        let header_name = HeaderName::try_from(config.header_name.trim()).map_err(|e| {
            ApplicationError::Configuration(format!(
                "csrf.header_name {:?} is not a valid header: {e}",
                config.header_name
            ))
        })?;
        Ok(Self {
            header_name,
            expected_value: config.expected_value.as_str().into(),
        })
    }
}

impl<S> Layer<S> for CsrfLayer {
    type Service = CsrfGuard<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CsrfGuard {
            inner,
            header_name: self.header_name.clone(),
            expected_value: Arc::clone(&self.expected_value),
        }
    }
}

/// Middleware service for the CSRF marker check
#[derive(Debug, Clone)]
pub struct CsrfGuard<S> {
    inner: S,
    header_name: HeaderName,
    expected_value: Arc<str>,
}

impl<S> Service<Request> for CsrfGuard<S>
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
        let mut inner = self.inner.clone();

        if is_read_class(req.method()) {
            return Box::pin(async move { inner.call(req).await });
        }

        let presented = req
            .headers()
            .get(&self.header_name)
            .map(|v| v.as_bytes())
            .unwrap_or_default();
        let accepted = !presented.is_empty()
            && constant_time_eq(presented, self.expected_value.as_bytes());

        if !accepted {
            debug!(method = %req.method(), path = %req.uri().path(), "CSRF marker rejected");
            return Box::pin(async { Ok(ApiError::unauthorized().into_response()) });
        }

        Box::pin(async move { inner.call(req).await })
    }
}
