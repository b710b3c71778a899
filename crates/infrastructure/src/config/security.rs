//! Security configuration: CSRF marker header and admin principals.

use domain::{Principal, UserId};
use serde::{Deserialize, Serialize};

/// Configuration for an admin user allowed to log in
///
/// Passwords must be pre-hashed using Argon2id format (PHC string).
/// Use `octocrm-cli hash-password` to produce one.
///
/// Example in config.toml:
/// ```toml
/// [[admin_users]]
/// id = "550e8400-e29b-41d4-a716-446655440000"
/// email = "admin@example.com"
/// display_name = "Admin"
/// password_hash = "$argon2id$v=19$m=19456,t=2,p=1$..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserEntry {
    /// Stable principal id (UUID)
    pub id: String,

    /// Login email
    pub email: String,

    /// Name shown in the admin UI
    #[serde(default)]
    pub display_name: String,

    /// Argon2id hash of the password in PHC format
    pub password_hash: String,
}

impl AdminUserEntry {
    /// Build the principal described by this entry
    pub fn principal(&self) -> Result<Principal, uuid::Error> {
        let id = UserId::parse(&self.id)?;
        let display_name = if self.display_name.is_empty() {
            self.email.clone()
        } else {
            self.display_name.clone()
        };
        Ok(Principal::new(id, &self.email, display_name))
    }
}

/// CSRF marker header configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfConfig {
    /// Header that must be present on state-changing admin requests
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Exact value the header must carry
    #[serde(default = "default_expected_value")]
    pub expected_value: String,
}

fn default_header_name() -> String {
    "x-requested-with".to_string()
}

fn default_expected_value() -> String {
    "XMLHttpRequest".to_string()
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            header_name: default_header_name(),
            expected_value: default_expected_value(),
        }
    }
}
