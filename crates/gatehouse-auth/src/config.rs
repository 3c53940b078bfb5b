//! Authentication configuration types and environment loading

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::{AuthError, AuthResult};

/// Upper bound for `session.ttl`: one year
pub const MAX_SESSION_TTL: u64 = 365 * 24 * 60 * 60;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "testing" | "test" => Ok(Environment::Testing),
            other => Err(AuthError::config_error(format!("Unknown environment: {}", other))),
        }
    }
}

/// Main authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// User store configuration
    #[serde(default)]
    pub store: UserStoreConfig,

    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Password hashing and policy configuration
    #[serde(default)]
    pub password: PasswordConfig,
}

/// User store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStoreConfig {
    /// Path of the JSON user file
    #[serde(default = "default_users_path")]
    pub path: PathBuf,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session storage backend (memory, file)
    #[serde(default = "default_session_storage")]
    pub storage: String,

    /// Directory used by the file backend
    #[serde(default = "default_session_path")]
    pub path: PathBuf,

    /// Inactivity window in seconds, measured from the last write
    #[serde(default = "default_session_ttl")]
    pub ttl: u64,

    /// Seconds between sweeps of expired sessions; 0 disables the sweep
    #[serde(default = "default_session_cleanup_interval")]
    pub cleanup_interval: u64,

    /// Secret used to sign session cookies
    #[serde(default = "default_session_secret")]
    pub secret: String,

    /// Session cookie name
    #[serde(default = "default_session_cookie_name")]
    pub cookie_name: String,

    /// Session cookie domain
    pub cookie_domain: Option<String>,

    /// Session cookie path
    #[serde(default = "default_session_cookie_path")]
    pub cookie_path: String,

    /// Session cookie secure flag
    #[serde(default = "default_false")]
    pub cookie_secure: bool,

    /// Session cookie HTTP-only flag
    #[serde(default = "default_true")]
    pub cookie_http_only: bool,

    /// Session cookie SameSite policy
    #[serde(default = "default_session_cookie_same_site")]
    pub cookie_same_site: String,
}

/// Password hashing and policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    /// Minimum password length
    #[serde(default = "default_min_password_length")]
    pub min_length: usize,

    /// Maximum password length
    #[serde(default = "default_max_password_length")]
    pub max_length: usize,

    /// Require uppercase letters
    #[serde(default = "default_false")]
    pub require_uppercase: bool,

    /// Require lowercase letters
    #[serde(default = "default_false")]
    pub require_lowercase: bool,

    /// Require numbers
    #[serde(default = "default_false")]
    pub require_numbers: bool,

    /// Password hashing algorithm (argon2, bcrypt)
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,

    /// Bcrypt cost factor (if using bcrypt)
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    /// Argon2 memory cost in KB (if using argon2)
    #[serde(default = "default_argon2_memory")]
    pub argon2_memory: u32,

    /// Argon2 time cost (iterations)
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism factor
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// Default value functions
fn default_users_path() -> PathBuf {
    PathBuf::from(".users")
}
fn default_session_storage() -> String {
    "memory".to_string()
}
fn default_session_path() -> PathBuf {
    PathBuf::from("./sessions")
}
fn default_session_ttl() -> u64 {
    24 * 60 * 60
} // 24 hours
fn default_session_cleanup_interval() -> u64 {
    60 * 60
}
fn default_session_secret() -> String {
    "dev-session-secret-change-in-production".to_string()
}
fn default_session_cookie_name() -> String {
    "gatehouse.sid".to_string()
}
fn default_session_cookie_path() -> String {
    "/".to_string()
}
fn default_session_cookie_same_site() -> String {
    "Lax".to_string()
}
fn default_min_password_length() -> usize {
    6
}
fn default_max_password_length() -> usize {
    128
}
fn default_hash_algorithm() -> String {
    "argon2".to_string()
}
fn default_bcrypt_cost() -> u32 {
    10
}
fn default_argon2_memory() -> u32 {
    19456
} // 19 MiB
fn default_argon2_iterations() -> u32 {
    2
}
fn default_argon2_parallelism() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}

impl Default for UserStoreConfig {
    fn default() -> Self {
        Self { path: default_users_path() }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage: default_session_storage(),
            path: default_session_path(),
            ttl: default_session_ttl(),
            cleanup_interval: default_session_cleanup_interval(),
            secret: default_session_secret(),
            cookie_name: default_session_cookie_name(),
            cookie_domain: None,
            cookie_path: default_session_cookie_path(),
            cookie_secure: default_false(),
            cookie_http_only: default_true(),
            cookie_same_site: default_session_cookie_same_site(),
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_password_length(),
            max_length: default_max_password_length(),
            require_uppercase: default_false(),
            require_lowercase: default_false(),
            require_numbers: default_false(),
            hash_algorithm: default_hash_algorithm(),
            bcrypt_cost: default_bcrypt_cost(),
            argon2_memory: default_argon2_memory(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl AuthConfig {
    /// Development configuration
    pub fn development() -> Self {
        Self::default()
    }

    /// Production configuration. The session secret still has to be supplied.
    pub fn production() -> Self {
        let mut config = Self::default();
        config.environment = Environment::Production;
        config.session.storage = "file".to_string();
        config.session.secret = String::new();
        config.session.cookie_secure = true;
        config.session.cookie_same_site = "Strict".to_string();
        config
    }

    /// Testing configuration with the cheapest hashing parameters
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.environment = Environment::Testing;
        config.password.bcrypt_cost = 4;
        config.password.argon2_memory = 1024;
        config.password.argon2_iterations = 1;
        config
    }

    /// Load configuration from environment variables on top of the preset
    /// for the selected environment, then validate it
    pub fn from_env() -> AuthResult<Self> {
        let environment = match env::var("GATEHOUSE_ENV").or_else(|_| env::var("NODE_ENV")) {
            Ok(value) => value.parse()?,
            Err(_) => Environment::Development,
        };

        let mut config = match environment {
            Environment::Development => Self::development(),
            Environment::Production => Self::production(),
            Environment::Testing => Self::testing(),
        };

        if let Ok(secret) = env::var("SESSION_SECRET") {
            config.session.secret = secret;
        }

        if let Ok(path) = env::var("USERS_FILE") {
            config.store.path = PathBuf::from(path);
        }

        if let Ok(storage) = env::var("SESSION_STORE") {
            config.session.storage = storage;
        }

        if let Ok(path) = env::var("SESSION_DIR") {
            config.session.path = PathBuf::from(path);
        }

        if let Ok(ttl) = env::var("SESSION_TTL") {
            config.session.ttl = ttl.parse().map_err(|_| {
                AuthError::config_error(format!("SESSION_TTL must be a number of seconds, got '{}'", ttl))
            })?;
        }

        if let Ok(interval) = env::var("SESSION_CLEANUP_INTERVAL") {
            config.session.cleanup_interval = interval.parse().map_err(|_| {
                AuthError::config_error(format!(
                    "SESSION_CLEANUP_INTERVAL must be a number of seconds, got '{}'",
                    interval
                ))
            })?;
        }

        if let Ok(algorithm) = env::var("PASSWORD_HASHER") {
            config.password.hash_algorithm = algorithm;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> AuthResult<()> {
        if self.environment.is_production() && self.session.secret.len() < 32 {
            return Err(AuthError::config_error(
                "Session secret must be at least 32 characters in production",
            ));
        }

        if self.session.secret.is_empty() {
            return Err(AuthError::config_error("Session secret must not be empty"));
        }

        if self.session.ttl == 0 {
            return Err(AuthError::config_error("Session ttl must be greater than zero"));
        }

        if self.session.ttl > MAX_SESSION_TTL {
            return Err(AuthError::config_error(format!(
                "Session ttl must be at most {} seconds",
                MAX_SESSION_TTL
            )));
        }

        if !["memory", "file"].contains(&self.session.storage.as_str()) {
            return Err(AuthError::config_error(format!(
                "Invalid session storage backend: {}",
                self.session.storage
            )));
        }

        if !["Strict", "Lax", "None"].contains(&self.session.cookie_same_site.as_str()) {
            return Err(AuthError::config_error("Invalid session cookie SameSite policy"));
        }

        if !["argon2", "bcrypt"].contains(&self.password.hash_algorithm.as_str()) {
            return Err(AuthError::config_error(format!(
                "Unknown password hashing algorithm: {}",
                self.password.hash_algorithm
            )));
        }

        if self.password.min_length < 1 {
            return Err(AuthError::config_error("Password min_length must be at least 1"));
        }

        if self.password.hash_algorithm == "bcrypt"
            && self.password.min_length > crate::utils::BCRYPT_MAX_PASSWORD_BYTES
        {
            return Err(AuthError::config_error(
                "Password min_length exceeds the bcrypt input limit of 72 bytes",
            ));
        }

        if self.password.min_length > self.password.max_length {
            return Err(AuthError::config_error(
                "Password min_length cannot be greater than max_length",
            ));
        }

        Ok(())
    }
}
