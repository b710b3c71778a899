//! Principal directory backed by the `admin_users` configuration list

use std::sync::Arc;

use application::{error::ApplicationError, ports::PrincipalPort};
use async_trait::async_trait;
use domain::{Principal, UserId};
use secrecy::{ExposeSecret, SecretString};
use tokio::task;
use tracing::{debug, instrument};

use super::PasswordHasher;
use crate::config::AdminUserEntry;

#[derive(Debug)]
struct PrincipalEntry {
    principal: Principal,
    password_hash: String,
}

/// Admin principals loaded from configuration
///
/// Login for an unknown email still runs one Argon2 verification against a
/// throwaway hash, so the response time is the same as for a wrong password.
#[derive(Debug, Clone)]
pub struct ConfiguredPrincipals {
    entries: Arc<Vec<PrincipalEntry>>,
    dummy_hash: Arc<str>,
}

impl ConfiguredPrincipals {
    /// Build the directory from configuration entries
    pub fn from_config(users: &[AdminUserEntry]) -> Result<Self, ApplicationError> {
        let mut entries = Vec::with_capacity(users.len());
        for user in users {
            let principal = user.principal().map_err(|e| {
                ApplicationError::Configuration(format!(
                    "admin user {} has an invalid id: {e}",
                    user.email
                ))
            })?;
            if !PasswordHasher::is_hashed(&user.password_hash) {
                return Err(ApplicationError::Configuration(format!(
                    "admin user {} must use an Argon2 password hash",
                    user.email
                )));
            }
            entries.push(PrincipalEntry {
                principal,
                password_hash: user.password_hash.clone(),
            });
        }

        let dummy_hash = PasswordHasher::new()
            .hash("octocrm-unknown-principal")
            .map_err(|e| ApplicationError::Internal(e.to_string()))?;

        Ok(Self {
            entries: Arc::new(entries),
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Number of configured principals
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no principal is configured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PrincipalPort for ConfiguredPrincipals {
    async fn get(&self, id: &UserId) -> Result<Option<Principal>, ApplicationError> {
        Ok(self
            .entries
            .iter()
            .find(|e| e.principal.id == *id)
            .map(|e| e.principal.clone()))
    }

    #[instrument(skip(self, password))]
    async fn verify_credentials(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<Principal>, ApplicationError> {
        let email = email.trim().to_lowercase();
        let entry = self.entries.iter().find(|e| e.principal.email == email);

        let hash = entry.map_or_else(|| self.dummy_hash.to_string(), |e| e.password_hash.clone());
        let password = SecretString::from(password.expose_secret().to_owned());

        let matches = task::spawn_blocking(move || {
            PasswordHasher::new().verify(password.expose_secret(), &hash)
        })
        .await
        .map_err(|e| ApplicationError::Internal(e.to_string()))?
        .map_err(|e| ApplicationError::Internal(e.to_string()))?;

        match entry {
            Some(entry) if matches => Ok(Some(entry.principal.clone())),
            _ => {
                debug!(known_email = entry.is_some(), "Credential check failed");
                Ok(None)
            },
        }
    }
}
