//! Authentication guards for protected handlers

use std::collections::HashSet;

use super::session::{AuthState, RequestSession};
use crate::user::User;
use crate::{AuthError, AuthResult};

/// Admit authenticated requests, reject anonymous ones with
/// [`AuthError::Unauthenticated`]. Pure decision, no I/O.
pub fn require_authenticated(state: &AuthState) -> AuthResult<&User> {
    match state {
        AuthState::Authenticated(user) => Ok(user),
        AuthState::Anonymous => Err(AuthError::Unauthenticated),
    }
}

/// Required authentication guard with a set of public paths
#[derive(Debug, Clone)]
pub struct RequireAuth {
    skip_paths: HashSet<String>,
}

impl Default for RequireAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RequireAuth {
    /// Create a new guard; every path is protected
    pub fn new() -> Self {
        Self {
            skip_paths: HashSet::new(),
        }
    }

    /// Add a path prefix that does not require authentication
    pub fn skip_path<S: Into<String>>(mut self, path: S) -> Self {
        self.skip_paths.insert(path.into());
        self
    }

    /// Add multiple public path prefixes
    pub fn skip_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Check if the path should skip authentication
    pub fn should_skip_path(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|skip| path.starts_with(skip.as_str()))
    }

    /// Decide a request: `Ok(None)` for public paths, `Ok(Some(user))` for
    /// authenticated requests, `Err(Unauthenticated)` otherwise.
    pub fn check<'a>(&self, path: &str, session: &'a RequestSession) -> AuthResult<Option<&'a User>> {
        if self.should_skip_path(path) {
            return Ok(None);
        }
        require_authenticated(session.state()).map(Some)
    }
}
