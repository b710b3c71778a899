//! Port for resolving principals (human users)

use async_trait::async_trait;
use domain::{Principal, UserId};
use secrecy::SecretString;

#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for looking up principals and checking their passwords
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PrincipalPort: Send + Sync {
    /// Resolve a principal by id
    async fn get(&self, id: &UserId) -> Result<Option<Principal>, ApplicationError>;

    /// Check an email/password pair
    ///
    /// Returns `None` for an unknown email and for a wrong password alike.
    async fn verify_credentials(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<Principal>, ApplicationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn PrincipalPort>();
    }
}
