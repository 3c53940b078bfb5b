//! Authentication error types

use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Authentication, registration and store errors
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthError {
    /// Invalid credentials provided. Deliberately identical for an unknown
    /// user and a wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Registration conflict
    #[error("Username already taken: {username}")]
    DuplicateUsername { username: String },

    /// Username rejected at registration
    #[error("Invalid username: {message}")]
    InvalidUsername { message: String },

    /// Password rejected by the password policy
    #[error("Invalid password: {message}")]
    InvalidPassword { message: String },

    /// The request carries no authenticated identity
    #[error("Unauthenticated")]
    Unauthenticated,

    /// The user store could not be read or written
    #[error("User store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Session store errors
    #[error("Session error: {message}")]
    SessionError { message: String },

    /// Configuration errors
    #[error("Authentication configuration error: {message}")]
    ConfigurationError { message: String },

    /// Cryptographic errors
    #[error("Cryptographic error: {message}")]
    CryptographicError { message: String },
}

impl AuthError {
    /// Get the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::DuplicateUsername { .. } => "DUPLICATE_USERNAME",
            AuthError::InvalidUsername { .. } => "INVALID_USERNAME",
            AuthError::InvalidPassword { .. } => "INVALID_PASSWORD",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            AuthError::SessionError { .. } => "SESSION_ERROR",
            AuthError::ConfigurationError { .. } => "CONFIGURATION_ERROR",
            AuthError::CryptographicError { .. } => "CRYPTOGRAPHIC_ERROR",
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials => 401,
            AuthError::Unauthenticated => 401,
            AuthError::DuplicateUsername { .. } => 409,
            AuthError::InvalidUsername { .. } => 422,
            AuthError::InvalidPassword { .. } => 422,
            AuthError::StoreUnavailable { .. } => 500,
            AuthError::SessionError { .. } => 500,
            AuthError::ConfigurationError { .. } => 500,
            AuthError::CryptographicError { .. } => 500,
        }
    }

    /// Whether the error is a normal negative outcome that should be routed
    /// back to the user (re-prompt) rather than treated as a server failure
    pub fn is_user_facing(&self) -> bool {
        self.status_code() < 500
    }

    /// Create a duplicate username error
    pub fn duplicate_username(username: impl Into<String>) -> Self {
        Self::DuplicateUsername { username: username.into() }
    }

    /// Create an invalid username error
    pub fn invalid_username(message: impl Into<String>) -> Self {
        Self::InvalidUsername { message: message.into() }
    }

    /// Create an invalid password error
    pub fn invalid_password(message: impl Into<String>) -> Self {
        Self::InvalidPassword { message: message.into() }
    }

    /// Create a store unavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable { message: message.into() }
    }

    /// Create a session error
    pub fn session_error(message: impl Into<String>) -> Self {
        Self::SessionError { message: message.into() }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Create a cryptographic error
    pub fn crypto_error(message: impl Into<String>) -> Self {
        Self::CryptographicError { message: message.into() }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        Self::store_unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::store_unavailable(format!("malformed record data: {}", err))
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::store_unavailable(format!("background task failed: {}", err))
    }
}

#[cfg(feature = "argon2")]
impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::crypto_error(err.to_string())
    }
}

#[cfg(feature = "bcrypt")]
impl From<bcrypt::BcryptError> for AuthError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::crypto_error(err.to_string())
    }
}
