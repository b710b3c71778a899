//! HTTP middleware
//!
//! Request pipeline pieces, outermost first: context seeding, CSRF guard,
//! credential gates, throttle, scope enforcement.

mod api_key_auth;
mod context;
mod csrf;
mod rate_limit;
mod session_auth;
mod validation;

pub use api_key_auth::{ApiKeyAuth, ApiKeyAuthLayer, RequireScope, RequireScopeLayer};
pub use context::{REQUEST_ID_HEADER, RequestContextLayer, RequestContextService, RequestId};
pub use csrf::{CsrfGuard, CsrfLayer};
pub use rate_limit::{
    ClientIp, RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET, Throttle, ThrottleLayer,
    ThrottleMode, client_ip,
};
pub(crate) use session_auth::append_cookie;
pub use session_auth::{SessionAuth, SessionAuthLayer, clear_session_cookie, session_cookie};
pub use validation::ValidatedJson;

/// Whether a gate rejects unauthenticated requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Reject absent or invalid credentials
    Required,
    /// Pass absent or invalid credentials through unauthenticated
    Optional,
}
