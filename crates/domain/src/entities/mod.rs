//! Domain entities - Objects with identity and lifecycle

mod api_key;
mod principal;
mod rate_limit;
mod session;

pub use api_key::ApiKey;
pub use principal::Principal;
pub use rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimitTier, RateLimitWindow};
pub use session::{Session, SessionDuration, SessionMetadata};
