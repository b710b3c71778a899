//! OctoCRM HTTP presentation layer
//!
//! Authentication, authorization and throttling gates for the OctoCRM API,
//! plus the admin endpoints that manage API keys and sessions.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod tasks;

#[cfg(test)]
mod testing;

pub use error::{ApiError, ErrorResponse};
pub use middleware::{
    ApiKeyAuthLayer, CsrfLayer, RequestContextLayer, RequireScopeLayer, SessionAuthLayer,
    ThrottleLayer, ThrottleMode, ValidatedJson,
};
pub use routes::{create_router, create_router_with};
pub use state::AppState;
