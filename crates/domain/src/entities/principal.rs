//! Principal entity - the admin user a browser session belongs to

use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

/// An authenticated human operator of the admin application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier referenced by sessions
    pub id: UserId,
    /// Login email, stored lowercase
    pub email: String,
    /// Name shown in the admin UI
    pub display_name: String,
}

impl Principal {
    /// Create a principal, normalising the email to lowercase
    pub fn new(id: UserId, email: impl AsRef<str>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.as_ref().trim().to_lowercase(),
            display_name: display_name.into(),
        }
    }
}
