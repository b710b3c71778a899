//! Credential codec
//!
//! Generates, shape-checks, and digests bearer credentials. Two formats exist:
//! API keys (`oct_` + 32 alphanumerics) and session tokens (`octs_` + 48
//! alphanumerics). Only the SHA-256 digest of a credential is ever persisted.
//!
//! # Examples
//!
//! ```
//! use application::CredentialCodec;
//! use secrecy::ExposeSecret;
//!
//! let codec = CredentialCodec::api_key();
//! let generated = codec.generate();
//!
//! assert!(codec.is_well_formed(generated.plaintext.expose_secret()));
//! assert_eq!(CredentialCodec::hash(generated.plaintext.expose_secret()), generated.hash);
//! ```

use rand::{Rng, distr::Alphanumeric};
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Marker for API keys
pub const API_KEY_TAG: &str = "oct_";
/// Marker for session tokens
pub const SESSION_TOKEN_TAG: &str = "octs_";

const API_KEY_BODY_LEN: usize = 32;
const SESSION_TOKEN_BODY_LEN: usize = 48;
const DISPLAY_PREFIX_BODY_LEN: usize = 8;

/// A freshly generated credential
///
/// The plaintext is returned to the caller exactly once and must not be
/// stored; `hash` is what goes to storage.
#[derive(Debug)]
pub struct GeneratedCredential {
    /// The bearer value handed to the client
    pub plaintext: SecretString,
    /// Lowercase hex SHA-256 digest of the plaintext
    pub hash: String,
    /// Non-secret identifier for listings, e.g. `oct_AbCd1234...`
    pub display_prefix: String,
}

/// Format description and operations for one credential kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialCodec {
    tag: &'static str,
    body_len: usize,
}

impl CredentialCodec {
    /// Codec for API keys
    pub const fn api_key() -> Self {
        Self {
            tag: API_KEY_TAG,
            body_len: API_KEY_BODY_LEN,
        }
    }

    /// Codec for session tokens
    pub const fn session_token() -> Self {
        Self {
            tag: SESSION_TOKEN_TAG,
            body_len: SESSION_TOKEN_BODY_LEN,
        }
    }

    /// Literal marker every credential of this kind starts with
    pub const fn tag(&self) -> &'static str {
        self.tag
    }

    /// Full length of a well-formed credential
    pub const fn total_len(&self) -> usize {
        self.tag.len() + self.body_len
    }

    /// Generate a new credential from the thread-local CSPRNG
    pub fn generate(&self) -> GeneratedCredential {
        let body: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.body_len)
            .map(char::from)
            .collect();
        let plaintext = format!("{}{body}", self.tag);

        let hash = Self::hash(&plaintext);
        let display_prefix = self.display_prefix_unchecked(&plaintext);

        GeneratedCredential {
            plaintext: SecretString::from(plaintext),
            hash,
            display_prefix,
        }
    }

    /// Lowercase hex SHA-256 digest of `plaintext`
    ///
    /// Deterministic and format-agnostic, so lookups by digest work for any
    /// input.
    pub fn hash(plaintext: &str) -> String {
        hex::encode(Sha256::digest(plaintext.as_bytes()))
    }

    /// Cheap shape check, run before any lookup
    ///
    /// Accepts exactly: the tag, followed by `body_len` ASCII alphanumerics.
    pub fn is_well_formed(&self, candidate: &str) -> bool {
        candidate.len() == self.total_len()
            && candidate
                .strip_prefix(self.tag)
                .is_some_and(|body| body.bytes().all(|b| b.is_ascii_alphanumeric()))
    }

    /// Display prefix for a well-formed credential
    pub fn display_prefix(&self, plaintext: &str) -> Option<String> {
        self.is_well_formed(plaintext)
            .then(|| self.display_prefix_unchecked(plaintext))
    }

    fn display_prefix_unchecked(&self, plaintext: &str) -> String {
        let end = (self.tag.len() + DISPLAY_PREFIX_BODY_LEN).min(plaintext.len());
        format!("{}...", &plaintext[..end])
    }
}

/// Compare two byte strings in time independent of where they differ
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
