//! In-memory port implementations shared by service tests

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{ApiKey, ApiKeyId, Principal, Session, SessionId, UserId};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

use crate::{
    error::ApplicationError,
    ports::{ApiKeyStorePort, PrincipalPort, SessionStorePort},
};

#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    pub keys: Mutex<Vec<ApiKey>>,
}

#[async_trait]
impl ApiKeyStorePort for InMemoryApiKeyStore {
    async fn insert(&self, key: &ApiKey) -> Result<(), ApplicationError> {
        self.keys.lock().push(key.clone());
        Ok(())
    }

    async fn find_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, ApplicationError> {
        Ok(self
            .keys
            .lock()
            .iter()
            .find(|k| k.key_hash == key_hash && k.is_active())
            .cloned())
    }

    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, ApplicationError> {
        Ok(self.keys.lock().iter().find(|k| k.id == *id).cloned())
    }

    async fn list(&self, include_revoked: bool) -> Result<Vec<ApiKey>, ApplicationError> {
        let mut keys: Vec<ApiKey> = self
            .keys
            .lock()
            .iter()
            .filter(|k| include_revoked || k.is_active())
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn update(&self, key: &ApiKey) -> Result<bool, ApplicationError> {
        let mut keys = self.keys.lock();
        match keys.iter_mut().find(|k| k.id == key.id) {
            Some(existing) => {
                existing.name.clone_from(&key.name);
                existing.scopes.clone_from(&key.scopes);
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn touch_last_used(
        &self,
        id: &ApiKeyId,
        at: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        if let Some(existing) = self.keys.lock().iter_mut().find(|k| k.id == *id) {
            existing.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn revoke(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<bool, ApplicationError> {
        Ok(self
            .keys
            .lock()
            .iter_mut()
            .find(|k| k.id == *id)
            .is_some_and(|k| k.revoke(at)))
    }

    async fn delete(&self, id: &ApiKeyId) -> Result<bool, ApplicationError> {
        let mut keys = self.keys.lock();
        let before = keys.len();
        keys.retain(|k| k.id != *id);
        Ok(keys.len() != before)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    pub sessions: Mutex<HashMap<SessionId, Session>>,
}

#[async_trait]
impl SessionStorePort for InMemorySessionStore {
    async fn insert(&self, session: &Session) -> Result<(), ApplicationError> {
        self.sessions.lock().insert(session.id, session.clone());
        Ok(())
    }

    async fn find_valid_by_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, ApplicationError> {
        Ok(self
            .sessions
            .lock()
            .values()
            .find(|s| s.token_hash == token_hash && !s.is_expired_at(now))
            .cloned())
    }

    async fn update_expiration(
        &self,
        id: &SessionId,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, ApplicationError> {
        Ok(self
            .sessions
            .lock()
            .get_mut(id)
            .map(|s| s.expires_at = expires_at)
            .is_some())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, ApplicationError> {
        Ok(self.sessions.lock().remove(id).is_some())
    }

    async fn delete_for_user(&self, user_id: &UserId) -> Result<u64, ApplicationError> {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != *user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, ApplicationError> {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }
}

/// Principals with plaintext passwords, for tests only
#[derive(Debug, Default)]
pub struct StaticPrincipals {
    pub entries: Mutex<Vec<(Principal, String)>>,
}

impl StaticPrincipals {
    pub fn with(principal: Principal, password: &str) -> Arc<Self> {
        let directory = Self::default();
        directory.entries.lock().push((principal, password.to_string()));
        Arc::new(directory)
    }

    pub fn remove(&self, id: &UserId) {
        self.entries.lock().retain(|(p, _)| p.id != *id);
    }
}

#[async_trait]
impl PrincipalPort for StaticPrincipals {
    async fn get(&self, id: &UserId) -> Result<Option<Principal>, ApplicationError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .find(|(p, _)| p.id == *id)
            .map(|(p, _)| p.clone()))
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<Principal>, ApplicationError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .entries
            .lock()
            .iter()
            .find(|(p, pw)| p.email == email && pw == password.expose_secret())
            .map(|(p, _)| p.clone()))
    }
}
