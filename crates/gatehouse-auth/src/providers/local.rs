//! Local username/password strategy backed by a [`UserRepository`]

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::store::{hash_off_thread, verify_off_thread};
use crate::traits::{AuthOutcome, CredentialStrategy, Rejection};
use crate::{AuthResult, PasswordHasher, UserRepository};

/// Verifies credentials against the user store.
///
/// An unknown username still costs one hash verification, against a hash
/// computed once per strategy, so response timing does not reveal which
/// usernames exist.
pub struct LocalStrategy {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    decoy_hash: OnceCell<String>,
}

impl LocalStrategy {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            users,
            hasher,
            decoy_hash: OnceCell::new(),
        }
    }

    async fn decoy_hash(&self) -> AuthResult<&str> {
        let hash = self
            .decoy_hash
            .get_or_try_init(|| hash_off_thread(self.hasher.clone(), "gatehouse-decoy-password"))
            .await?;
        Ok(hash.as_str())
    }
}

#[async_trait]
impl CredentialStrategy for LocalStrategy {
    async fn authenticate(&self, username: &str, password: &str) -> AuthResult<AuthOutcome> {
        let user = self.users.find_by_username(username).await?;

        let Some(user) = user else {
            let decoy = self.decoy_hash().await?;
            verify_off_thread(self.hasher.clone(), password, decoy).await?;
            tracing::debug!(username = %username, "Login rejected");
            return Ok(AuthOutcome::Rejected(Rejection::InvalidCredentials));
        };

        if verify_off_thread(self.hasher.clone(), password, &user.password_hash).await? {
            tracing::debug!(user_id = user.id, "Credentials verified");
            Ok(AuthOutcome::Authenticated(user))
        } else {
            tracing::debug!(username = %username, "Login rejected");
            Ok(AuthOutcome::Rejected(Rejection::InvalidCredentials))
        }
    }

    fn strategy_name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUserStore;
    use crate::user::{User, UserId};
    use crate::utils::Argon2Hasher;
    use crate::AuthError;

    fn setup() -> (Arc<MemoryUserStore>, LocalStrategy) {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher::development());
        let store = Arc::new(MemoryUserStore::new(hasher.clone()));
        let strategy = LocalStrategy::new(store.clone(), hasher);
        (store, strategy)
    }

    /// Store whose reads always fail
    struct BrokenStore;

    #[async_trait]
    impl UserRepository for BrokenStore {
        async fn list_users(&self) -> AuthResult<Vec<User>> {
            Err(AuthError::store_unavailable("disk gone"))
        }

        async fn find_by_username(&self, _username: &str) -> AuthResult<Option<User>> {
            Err(AuthError::store_unavailable("disk gone"))
        }

        async fn find_by_id(&self, _id: UserId) -> AuthResult<Option<User>> {
            Err(AuthError::store_unavailable("disk gone"))
        }

        async fn add_user_with_role(
            &self,
            _username: &str,
            _password: &str,
            _role: Option<String>,
        ) -> AuthResult<User> {
            Err(AuthError::store_unavailable("disk gone"))
        }
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let (store, strategy) = setup();
        let alice = store.add_user("alice", "secret1").await.unwrap();

        let outcome = strategy.authenticate("alice", "secret1").await.unwrap();
        assert_eq!(outcome, AuthOutcome::Authenticated(alice));
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_the_same() {
        let (store, strategy) = setup();
        store.add_user("alice", "secret1").await.unwrap();

        let wrong_password = strategy.authenticate("alice", "wrong").await.unwrap();
        let unknown_user = strategy.authenticate("mallory", "secret1").await.unwrap();

        assert_eq!(wrong_password, AuthOutcome::Rejected(Rejection::InvalidCredentials));
        assert_eq!(wrong_password, unknown_user);
    }

    #[tokio::test]
    async fn test_username_is_case_sensitive() {
        let (store, strategy) = setup();
        store.add_user("alice", "secret1").await.unwrap();

        let outcome = strategy.authenticate("ALICE", "secret1").await.unwrap();
        assert!(!outcome.is_authenticated());
    }

    #[tokio::test]
    async fn test_store_failure_is_an_error() {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher::development());
        let strategy = LocalStrategy::new(Arc::new(BrokenStore), hasher);

        let err = strategy.authenticate("alice", "secret1").await.unwrap_err();
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
    }
}
