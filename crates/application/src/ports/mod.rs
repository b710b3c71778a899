//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod api_key_store;
mod clock;
mod principal_port;
mod rate_limit_port;
mod session_store;

#[cfg(test)]
pub use api_key_store::MockApiKeyStorePort;
pub use api_key_store::ApiKeyStorePort;
pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(test)]
pub use principal_port::MockPrincipalPort;
pub use principal_port::PrincipalPort;
#[cfg(test)]
pub use rate_limit_port::MockRateLimitPort;
pub use rate_limit_port::RateLimitPort;
#[cfg(test)]
pub use session_store::MockSessionStorePort;
pub use session_store::SessionStorePort;
