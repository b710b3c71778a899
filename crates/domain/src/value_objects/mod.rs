//! Value Objects - Immutable, identity-less domain primitives

mod api_key_id;
mod scope;
mod session_id;
mod user_id;

pub use api_key_id::ApiKeyId;
pub use scope::{KNOWN_SCOPES, Scope};
pub use session_id::SessionId;
pub use user_id::UserId;
