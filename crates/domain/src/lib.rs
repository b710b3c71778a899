//! Domain layer for the OctoCRM access gateway
//!
//! Contains the credential entities (API keys, sessions, principals), scope
//! capabilities and the rate-limit window arithmetic. This layer performs no
//! I/O and defines the ubiquitous language shared by the outer layers.

pub mod entities;
pub mod errors;
pub mod scope_matcher;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use scope_matcher::{all_valid, first_unknown, has_scope};
pub use value_objects::*;
