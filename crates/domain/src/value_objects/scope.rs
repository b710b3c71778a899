//! Capability scope value object
//!
//! A scope is a capability string of the shape `resource:action`, or one of the
//! wildcard forms `resource:*` and `*`. Scopes are evaluated structurally by the
//! [`scope_matcher`](crate::scope_matcher); this type only guarantees that the
//! string has a valid shape.
//!
//! # Examples
//!
//! ```
//! use domain::Scope;
//!
//! let scope = Scope::parse("leads:read").unwrap();
//! assert_eq!(scope.resource(), "leads");
//!
//! assert!(Scope::parse("leads:*").unwrap().is_wildcard());
//! assert!(Scope::parse("*:read").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Every scope an API key may be granted.
///
/// Wildcards appear here as literal entries: they are granted explicitly at
/// issuance, never derived from a request.
pub const KNOWN_SCOPES: &[&str] = &[
    "leads:read",
    "leads:write",
    "leads:delete",
    "leads:*",
    "contacts:read",
    "contacts:write",
    "contacts:delete",
    "contacts:*",
    "companies:read",
    "companies:write",
    "companies:delete",
    "companies:*",
    "webhooks:read",
    "webhooks:write",
    "webhooks:delete",
    "webhooks:*",
    "*",
];

/// Global wildcard granting every capability
const GLOBAL_WILDCARD: &str = "*";

/// A syntactically valid capability scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope(String);

impl Scope {
    /// Parse a scope, checking its shape
    ///
    /// Accepted forms are `*`, `resource:*` and `resource:action` where both
    /// segments are non-empty and made of lowercase ASCII letters, digits,
    /// `_` or `-`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidScope`] for any other shape.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        if value == GLOBAL_WILDCARD {
            return Ok(Self(value.to_string()));
        }

        let Some((resource, action)) = value.split_once(':') else {
            return Err(DomainError::InvalidScope(value.to_string()));
        };

        let valid_resource = is_segment(resource);
        let valid_action = action == GLOBAL_WILDCARD || is_segment(action);
        if valid_resource && valid_action {
            Ok(Self(value.to_string()))
        } else {
            Err(DomainError::InvalidScope(value.to_string()))
        }
    }

    /// The scope as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource part (substring before the first `:`)
    ///
    /// For the global wildcard this is `*`.
    pub fn resource(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(r, _)| r)
    }

    /// Whether this scope is `*` or `resource:*`
    pub fn is_wildcard(&self) -> bool {
        self.0 == GLOBAL_WILDCARD || self.0.ends_with(":*")
    }
}

fn is_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

impl AsRef<str> for Scope {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Scope {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.0
    }
}
