//! User store implementations
//!
//! - [`FileUserStore`]: JSON file on disk, replaced atomically on every write
//! - [`MemoryUserStore`]: process-local, for tests and ephemeral setups
//!
//! Both follow the same registration sequence: validate, reject known
//! usernames early, hash outside any lock, then append under the write lock
//! with the username check repeated against the fresh collection.

pub mod file;
pub mod memory;

pub use file::FileUserStore;
pub use memory::MemoryUserStore;

use std::sync::Arc;

use crate::utils::{validate_username, PasswordPolicy};
use crate::{AuthResult, PasswordHasher};

/// Hash on the blocking pool so the work factor never stalls the executor
pub(crate) async fn hash_off_thread(
    hasher: Arc<dyn PasswordHasher>,
    password: &str,
) -> AuthResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hasher.hash_password(&password)).await?
}

/// Verify on the blocking pool
pub(crate) async fn verify_off_thread(
    hasher: Arc<dyn PasswordHasher>,
    password: &str,
    hash: &str,
) -> AuthResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    Ok(tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash)).await?)
}

pub(crate) fn validate_registration(
    policy: &PasswordPolicy,
    username: &str,
    password: &str,
) -> AuthResult<()> {
    validate_username(username)?;
    policy.validate(password)
}
