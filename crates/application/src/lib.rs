//! Application layer - Use cases and orchestration
//!
//! Contains the credential codec, the port definitions the gateway depends
//! on, and the services that issue and validate API keys and sessions.

pub mod credentials;
pub mod error;
pub mod ports;
pub mod request_context;
pub mod services;

#[cfg(test)]
mod testing;

pub use credentials::{CredentialCodec, GeneratedCredential, constant_time_eq};
pub use error::ApplicationError;
pub use ports::*;
pub use request_context::RequestContext;
pub use services::*;
