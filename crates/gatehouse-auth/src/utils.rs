//! Password hashing, password policy and random token utilities

use std::sync::Arc;

use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::config::PasswordConfig;
use crate::{AuthError, AuthResult, PasswordHasher};

#[cfg(feature = "argon2")]
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};

/// Argon2id password hasher.
///
/// Verification reads the parameters embedded in the stored PHC string, so
/// raising the work factor only affects newly created hashes.
#[cfg(feature = "argon2")]
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
}

#[cfg(feature = "argon2")]
impl Argon2Hasher {
    /// Create a new Argon2 hasher with custom parameters
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// Create an Argon2 hasher optimized for production
    pub fn production() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Create an Argon2 hasher optimized for tests (fast)
    pub fn development() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> AuthResult<Argon2<'static>> {
        let params = argon2::Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|e| AuthError::crypto_error(e.to_string()))?;
        Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
    }
}

#[cfg(feature = "argon2")]
impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            memory_cost: 19456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

#[cfg(feature = "argon2")]
impl PasswordHasher for Argon2Hasher {
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut thread_rng());
        let password_hash = self.argon2()?.hash_password(password.as_bytes(), &salt)?;
        Ok(password_hash.to_string())
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn hasher_name(&self) -> &str {
        "argon2"
    }
}

/// bcrypt password hasher
#[cfg(feature = "bcrypt")]
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

#[cfg(feature = "bcrypt")]
impl BcryptHasher {
    /// Create a new bcrypt hasher with custom cost
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Create a bcrypt hasher optimized for tests (fast)
    pub fn development() -> Self {
        Self { cost: 4 }
    }
}

#[cfg(feature = "bcrypt")]
impl Default for BcryptHasher {
    fn default() -> Self {
        Self { cost: bcrypt::DEFAULT_COST }
    }
}

/// bcrypt only reads this many bytes of input; anything beyond is ignored
pub const BCRYPT_MAX_PASSWORD_BYTES: usize = 72;

#[cfg(feature = "bcrypt")]
impl PasswordHasher for BcryptHasher {
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        if password.len() > BCRYPT_MAX_PASSWORD_BYTES {
            return Err(AuthError::invalid_password(format!(
                "Password must be at most {} bytes long",
                BCRYPT_MAX_PASSWORD_BYTES
            )));
        }
        bcrypt::hash(password, self.cost).map_err(AuthError::from)
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        // Longer input would be truncated and match its 72-byte prefix
        if password.len() > BCRYPT_MAX_PASSWORD_BYTES {
            return false;
        }
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    fn hasher_name(&self) -> &str {
        "bcrypt"
    }
}

/// Hasher that verifies against whichever algorithm produced the stored
/// hash, and hashes new passwords with the configured one. Lets a store
/// hold bcrypt hashes from older deployments next to argon2 ones.
pub struct AnyHasher {
    primary: Arc<dyn PasswordHasher>,
}

impl AnyHasher {
    pub fn new(primary: Arc<dyn PasswordHasher>) -> Self {
        Self { primary }
    }
}

impl PasswordHasher for AnyHasher {
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        self.primary.hash_password(password)
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        #[cfg(feature = "argon2")]
        if hash.starts_with("$argon2") {
            return Argon2Hasher::default().verify_password(password, hash);
        }

        #[cfg(feature = "bcrypt")]
        if hash.starts_with("$2") {
            return BcryptHasher::default().verify_password(password, hash);
        }

        self.primary.verify_password(password, hash)
    }

    fn hasher_name(&self) -> &str {
        self.primary.hasher_name()
    }
}

/// Password hasher factory
pub struct PasswordHasherFactory;

impl PasswordHasherFactory {
    /// Create the hasher named in the configuration
    pub fn from_config(config: &PasswordConfig) -> AuthResult<Arc<dyn PasswordHasher>> {
        let primary: Arc<dyn PasswordHasher> = match config.hash_algorithm.as_str() {
            #[cfg(feature = "argon2")]
            "argon2" => Arc::new(Argon2Hasher::new(
                config.argon2_memory,
                config.argon2_iterations,
                config.argon2_parallelism,
            )),
            #[cfg(feature = "bcrypt")]
            "bcrypt" => Arc::new(BcryptHasher::new(config.bcrypt_cost)),
            other => {
                return Err(AuthError::config_error(format!(
                    "Unknown password hashing algorithm: {} (or feature not enabled)",
                    other
                )))
            }
        };

        Ok(Arc::new(AnyHasher::new(primary)))
    }
}

/// Password rules applied at registration
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    /// Byte limit imposed by the hashing algorithm, if any
    pub max_bytes: Option<usize>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::from_config(&PasswordConfig::default())
    }
}

impl PasswordPolicy {
    pub fn from_config(config: &PasswordConfig) -> Self {
        Self {
            min_length: config.min_length.max(1),
            max_length: config.max_length,
            require_uppercase: config.require_uppercase,
            require_lowercase: config.require_lowercase,
            require_numbers: config.require_numbers,
            max_bytes: (config.hash_algorithm == "bcrypt").then_some(BCRYPT_MAX_PASSWORD_BYTES),
        }
    }

    /// Check a plaintext password. Lengths are counted in characters, except
    /// for the algorithm byte limit.
    pub fn validate(&self, password: &str) -> AuthResult<()> {
        let length = password.chars().count();

        if length < self.min_length {
            return Err(AuthError::invalid_password(format!(
                "Password must be at least {} characters long",
                self.min_length
            )));
        }

        if length > self.max_length {
            return Err(AuthError::invalid_password(format!(
                "Password must be at most {} characters long",
                self.max_length
            )));
        }

        if let Some(max_bytes) = self.max_bytes {
            if password.len() > max_bytes {
                return Err(AuthError::invalid_password(format!(
                    "Password must be at most {} bytes long",
                    max_bytes
                )));
            }
        }

        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AuthError::invalid_password(
                "Password must contain at least one uppercase letter",
            ));
        }

        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Err(AuthError::invalid_password(
                "Password must contain at least one lowercase letter",
            ));
        }

        if self.require_numbers && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AuthError::invalid_password(
                "Password must contain at least one number",
            ));
        }

        Ok(())
    }
}

/// Maximum accepted username length
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Check a username at registration
pub fn validate_username(username: &str) -> AuthResult<()> {
    if username.is_empty() {
        return Err(AuthError::invalid_username("Username must not be empty"));
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AuthError::invalid_username(format!(
            "Username must be at most {} characters long",
            MAX_USERNAME_LENGTH
        )));
    }

    if username.trim() != username || username.chars().any(char::is_control) {
        return Err(AuthError::invalid_username(
            "Username must not contain control characters or surrounding whitespace",
        ));
    }

    Ok(())
}

/// Random value generation
pub struct CryptoUtils;

impl CryptoUtils {
    /// Generate a random string of specified length using alphanumeric characters
    pub fn generate_random_string(length: usize) -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }

    /// Generate a session id
    pub fn generate_session_id() -> String {
        Self::generate_random_string(32)
    }

    /// Generate a secret suitable for signing session cookies
    pub fn generate_session_secret() -> String {
        Self::generate_random_string(64)
    }
}
