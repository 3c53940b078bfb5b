//! User records and their persisted file format

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AuthError, AuthResult};

/// Unique, monotonically assigned user identifier
pub type UserId = u64;

/// A registered user.
///
/// `password_hash` is the opaque output of a [`crate::PasswordHasher`]. The
/// `Debug` rendering redacts it so a user can be logged safely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(alias = "password")]
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl User {
    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Public view of the user, safe to hand to presentation code
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            role: self.role.clone(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// User data without the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// On-disk user collection: the records plus the id counter, so ids are
/// never reused regardless of how the collection changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFile {
    pub next_id: UserId,
    pub users: Vec<User>,
}

impl Default for UserFile {
    fn default() -> Self {
        Self { next_id: 1, users: Vec::new() }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserFileRepr {
    Versioned(UserFile),
    Legacy(Vec<User>),
}

impl UserFile {
    /// Parse the file contents. A bare JSON array of users is accepted as
    /// well; its counter resumes after the highest id present.
    pub fn parse(data: &str) -> serde_json::Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let file = match serde_json::from_str::<UserFileRepr>(data)? {
            UserFileRepr::Versioned(mut file) => {
                file.next_id = file.next_id.max(next_after(&file.users));
                file
            }
            UserFileRepr::Legacy(users) => {
                Self {
                    next_id: next_after(&users),
                    users,
                }
            }
        };

        Ok(file)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn find_by_username(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn find_by_id(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Append a record under the next id and advance the counter. Fails
    /// without modifying the collection once the id space is exhausted.
    pub fn push(
        &mut self,
        username: String,
        password_hash: String,
        role: Option<String>,
    ) -> AuthResult<User> {
        let following = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| AuthError::store_unavailable("User id space exhausted"))?;
        let user = User {
            id: self.next_id,
            username,
            password_hash,
            role,
        };
        self.next_id = following;
        self.users.push(user.clone());
        Ok(user)
    }
}

/// Counter floor: one past the highest id present. Saturates, so a file
/// holding `u64::MAX` refuses further registrations instead of wrapping.
fn next_after(users: &[User]) -> UserId {
    users
        .iter()
        .map(|u| u.id)
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}
