//! In-memory user store

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{hash_off_thread, validate_registration};
use crate::user::{User, UserFile, UserId};
use crate::utils::PasswordPolicy;
use crate::{AuthError, AuthResult, PasswordHasher, UserRepository};

/// Process-local user store. Records are lost when the store is dropped.
pub struct MemoryUserStore {
    users: Arc<RwLock<UserFile>>,
    hasher: Arc<dyn PasswordHasher>,
    policy: PasswordPolicy,
}

impl MemoryUserStore {
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self::with_policy(hasher, PasswordPolicy::default())
    }

    pub fn with_policy(hasher: Arc<dyn PasswordHasher>, policy: PasswordPolicy) -> Self {
        Self {
            users: Arc::new(RwLock::new(UserFile::default())),
            hasher,
            policy,
        }
    }

    /// Remove a record. The id is not handed out again.
    pub async fn remove_user(&self, id: UserId) -> bool {
        let mut users = self.users.write().await;
        let before = users.users.len();
        users.users.retain(|u| u.id != id);
        users.users.len() != before
    }
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn list_users(&self) -> AuthResult<Vec<User>> {
        Ok(self.users.read().await.users.clone())
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        Ok(self.users.read().await.find_by_username(username).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
        Ok(self.users.read().await.find_by_id(id).cloned())
    }

    async fn add_user_with_role(
        &self,
        username: &str,
        password: &str,
        role: Option<String>,
    ) -> AuthResult<User> {
        validate_registration(&self.policy, username, password)?;

        if self.find_by_username(username).await?.is_some() {
            return Err(AuthError::duplicate_username(username));
        }

        let password_hash = hash_off_thread(self.hasher.clone(), password).await?;

        let mut users = self.users.write().await;
        if users.find_by_username(username).is_some() {
            return Err(AuthError::duplicate_username(username));
        }
        let user = users.push(username.to_string(), password_hash, role)?;
        drop(users);

        tracing::info!(user_id = user.id, username = %user.username, "Registered user");
        Ok(user)
    }
}
