//! Session entity - browser credential with sliding expiration

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    errors::DomainError,
    value_objects::{SessionId, UserId},
};

/// Maximum-lifetime class of a session, fixed at creation
///
/// Refreshing a session extends it by the duration of its own class; a
/// standard session is never upgraded to an extended one in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionDuration {
    /// Regular login
    Standard,
    /// "Remember me" login
    Extended,
}

impl SessionDuration {
    /// Pick the class for a login request
    pub const fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            Self::Extended
        } else {
            Self::Standard
        }
    }

    /// Storage representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Extended => "extended",
        }
    }
}

impl fmt::Display for SessionDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionDuration {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "extended" => Ok(Self::Extended),
            other => Err(DomainError::InvalidDurationClass(other.to_string())),
        }
    }
}

/// Client details captured at login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// `User-Agent` header of the login request
    pub user_agent: Option<String>,
    /// Resolved client address of the login request
    pub ip_address: Option<String>,
}

/// A persisted browser session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: SessionId,
    /// Owning principal
    pub user_id: UserId,
    /// Hex-encoded digest of the session token
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    /// Lifetime class chosen at login
    pub duration: SessionDuration,
    /// Absolute expiration instant
    pub expires_at: DateTime<Utc>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Client metadata
    pub metadata: SessionMetadata,
}

impl Session {
    /// Create a session expiring `lifetime` after `now`
    pub fn new(
        user_id: UserId,
        token_hash: impl Into<String>,
        duration: SessionDuration,
        lifetime: Duration,
        now: DateTime<Utc>,
        metadata: SessionMetadata,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            token_hash: token_hash.into(),
            duration,
            expires_at: now + lifetime,
            created_at: now,
            metadata,
        }
    }

    /// Whether the session has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left until expiry (negative once expired)
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_me_selects_extended() {
        assert_eq!(SessionDuration::from_remember_me(true), SessionDuration::Extended);
        assert_eq!(SessionDuration::from_remember_me(false), SessionDuration::Standard);
    }

    #[test]
    fn duration_class_roundtrips_through_str() {
        for class in [SessionDuration::Standard, SessionDuration::Extended] {
            assert_eq!(class.as_str().parse::<SessionDuration>().unwrap(), class);
        }
        assert!("forever".parse::<SessionDuration>().is_err());
    }

    #[test]
    fn new_session_expires_after_lifetime() {
        let now = Utc::now();
        let session = Session::new(
            UserId::new(),
            "hash",
            SessionDuration::Standard,
            Duration::hours(24),
            now,
            SessionMetadata::default(),
        );
        assert_eq!(session.expires_at, now + Duration::hours(24));
        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::hours(24)));
        assert_eq!(session.remaining(now + Duration::hours(20)), Duration::hours(4));
    }
}
