//! Core authentication traits
//!
//! These are the seams of the crate: every component receives its
//! collaborators through one of these traits, so stores, hashers and
//! strategies can be swapped without touching the session layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::{User, UserId};
use crate::AuthResult;

/// Password hasher trait for different hashing algorithms
pub trait PasswordHasher: Send + Sync {
    /// Hash a password with a fresh random salt
    fn hash_password(&self, password: &str) -> AuthResult<String>;

    /// Verify a password against its hash. A malformed hash is a mismatch,
    /// not an error.
    fn verify_password(&self, password: &str, hash: &str) -> bool;

    /// Get the hasher name
    fn hasher_name(&self) -> &str;
}

/// Durable repository of user records.
///
/// Implementations own their synchronization: reads may run concurrently,
/// writes are serialized against each other and against reads.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All records; empty when nothing has been stored yet
    async fn list_users(&self) -> AuthResult<Vec<User>>;

    /// Exact, case-sensitive username match
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>>;

    /// Register a user with an optional role
    async fn add_user_with_role(
        &self,
        username: &str,
        password: &str,
        role: Option<String>,
    ) -> AuthResult<User>;

    /// Register a user without a role
    async fn add_user(&self, username: &str, password: &str) -> AuthResult<User> {
        self.add_user_with_role(username, password, None).await
    }
}

/// Why a credential check was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// Unknown user or wrong password; the two are never distinguished
    InvalidCredentials,
}

impl Rejection {
    /// User-visible message
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::InvalidCredentials => "invalid credentials",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of a credential check that did not fail with an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(User),
    Rejected(Rejection),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    /// Collapse into a plain result, mapping a rejection to
    /// [`crate::AuthError::InvalidCredentials`]
    pub fn into_result(self) -> AuthResult<User> {
        match self {
            AuthOutcome::Authenticated(user) => Ok(user),
            AuthOutcome::Rejected(_) => Err(crate::AuthError::InvalidCredentials),
        }
    }
}

/// Pluggable credential verification backend.
///
/// `Ok(Authenticated)`, `Ok(Rejected)` and `Err` are the three outcomes; the
/// session layer only depends on this contract.
#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> AuthResult<AuthOutcome>;

    /// Get strategy name for identification
    fn strategy_name(&self) -> &str;
}

/// A stored session: at most one bound user per token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Session storage for session-based authentication
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live session. Expired sessions are reported as absent.
    async fn load(&self, id: &str) -> AuthResult<Option<SessionRecord>>;

    /// Create or replace a session
    async fn save(&self, id: &str, record: SessionRecord) -> AuthResult<()>;

    /// Delete a session; deleting an unknown id is not an error
    async fn destroy(&self, id: &str) -> AuthResult<()>;

    /// Remove expired sessions, returning how many were removed
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
