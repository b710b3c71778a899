//! API error handling
//!
//! Every gate and handler failure renders the same JSON body:
//! `{error, code, details?, retryAfter?}`. Backend failures never leak their
//! detail into the response; it is logged instead.

use std::collections::BTreeMap;

use application::ApplicationError;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use domain::DomainError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Field name to list of messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing API key")]
    MissingCredential,

    #[error("Invalid API key")]
    InvalidCredential,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Missing required scope: {0}")]
    InsufficientScope(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        details: Option<FieldErrors>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited { retry_after: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Validation failure without field details
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Session or CSRF rejection with the generic message
    pub fn unauthorized() -> Self {
        Self::Unauthorized("Authentication required".to_string())
    }

    /// HTTP status of this error
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential | Self::InvalidCredential | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            },
            Self::InsufficientScope(_) => StatusCode::FORBIDDEN,
            Self::InvalidScope(_) | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::Unauthorized(_) => "unauthorized",
            Self::InsufficientScope(_) => "insufficient_scope",
            Self::InvalidScope(_) => "invalid_scope",
            Self::Validation { .. } => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,
    /// Stable error code
    pub code: &'static str,
    /// Field-level validation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
    /// Seconds until the rate-limit window resets
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, details, retry_after) = match self {
            Self::MissingCredential => ("Missing API key".to_string(), None, None),
            // Unknown and revoked keys share this message
            Self::InvalidCredential => ("Invalid API key".to_string(), None, None),
            Self::Unauthorized(msg) | Self::NotFound(msg) => (msg, None, None),
            Self::InsufficientScope(scope) => {
                (format!("Missing required scope: {scope}"), None, None)
            },
            Self::InvalidScope(scope) => (format!("Invalid scope: {scope}"), None, None),
            Self::Validation { message, details } => (message, details, None),
            Self::RateLimited { retry_after } => (
                "Rate limit exceeded".to_string(),
                None,
                Some(retry_after),
            ),
            Self::Internal(detail) => {
                error!(error = %detail, "Request failed with internal error");
                ("An internal error occurred".to_string(), None, None)
            },
        };

        let body = ErrorResponse {
            error: message,
            code,
            details,
            retry_after,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        match err {
            ApplicationError::Domain(DomainError::InvalidScope(scope))
            | ApplicationError::InvalidScope(scope) => Self::InvalidScope(scope),
            ApplicationError::Domain(DomainError::NotFound { entity_type, id }) => {
                Self::NotFound(format!("{entity_type} not found: {id}"))
            },
            ApplicationError::Domain(e) => Self::validation(e.to_string()),
            ApplicationError::Validation(msg) => Self::validation(msg),
            ApplicationError::NotFound(msg) => Self::NotFound(format!("Not found: {msg}")),
            ApplicationError::InvalidCredentials => {
                Self::Unauthorized("Invalid email or password".to_string())
            },
            ApplicationError::Storage(msg)
            | ApplicationError::RateLimitBackend(msg)
            | ApplicationError::Configuration(msg)
            | ApplicationError::Internal(msg) => Self::Internal(msg),
        }
    }
}
