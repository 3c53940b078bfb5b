//! Reducing a user to its session reference and back

use std::sync::Arc;

use crate::user::{User, UserId};
use crate::{AuthResult, UserRepository};

/// Stores only the user id in the session and re-reads the full record on
/// every restoration, so role changes apply on the next request.
#[derive(Clone)]
pub struct IdentitySerializer {
    users: Arc<dyn UserRepository>,
}

impl IdentitySerializer {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub fn serialize(&self, user: &User) -> UserId {
        user.id
    }

    /// `Ok(None)` when the user no longer exists
    pub async fn deserialize(&self, id: UserId) -> AuthResult<Option<User>> {
        self.users.find_by_id(id).await
    }
}
