//! API key entity - long-lived programmatic credential
//!
//! Only the SHA-256 digest of the credential and a short display prefix are
//! ever part of this record. The plaintext exists only at issuance, in the
//! caller's hands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    scope_matcher,
    value_objects::{ApiKeyId, Scope},
};

/// A persisted API key record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Opaque identifier
    pub id: ApiKeyId,
    /// Human-readable name
    pub name: String,
    /// Hex-encoded digest of the credential
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    /// Non-secret display prefix, e.g. `oct_AbCd1234...`
    pub key_prefix: String,
    /// Granted scopes, in the order they were requested
    pub scopes: Vec<Scope>,
    /// Last successful validation (best-effort, may lag)
    pub last_used_at: Option<DateTime<Utc>>,
    /// When the key was issued
    pub created_at: DateTime<Utc>,
    /// Set once, never cleared
    revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Create a new, active key record
    ///
    /// Duplicate scopes are collapsed, keeping the first occurrence.
    pub fn new(
        name: impl Into<String>,
        key_hash: impl Into<String>,
        key_prefix: impl Into<String>,
        scopes: Vec<Scope>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApiKeyId::new(),
            name: name.into(),
            key_hash: key_hash.into(),
            key_prefix: key_prefix.into(),
            scopes: dedup_scopes(scopes),
            last_used_at: None,
            created_at,
            revoked_at: None,
        }
    }

    /// Restore revocation state loaded from storage
    ///
    /// Can only move a key from active to revoked; an existing revocation is
    /// kept as is.
    #[must_use]
    pub fn with_revoked_at(mut self, revoked_at: Option<DateTime<Utc>>) -> Self {
        if self.revoked_at.is_none() {
            self.revoked_at = revoked_at;
        }
        self
    }

    /// When the key was revoked, if it was
    pub const fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Whether the key can still authenticate requests
    pub const fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }

    /// Revoke the key
    ///
    /// Returns `false` (and changes nothing) if the key was already revoked.
    pub fn revoke(&mut self, at: DateTime<Utc>) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        self.revoked_at = Some(at);
        true
    }

    /// Replace the granted scopes
    pub fn set_scopes(&mut self, scopes: Vec<Scope>) {
        self.scopes = dedup_scopes(scopes);
    }

    /// Check whether this key's scopes authorize `required`
    pub fn has_scope(&self, required: &str) -> bool {
        scope_matcher::has_scope(&self.scopes, required)
    }
}

fn dedup_scopes(scopes: Vec<Scope>) -> Vec<Scope> {
    let mut unique: Vec<Scope> = Vec::with_capacity(scopes.len());
    for scope in scopes {
        if !unique.contains(&scope) {
            unique.push(scope);
        }
    }
    unique
}
