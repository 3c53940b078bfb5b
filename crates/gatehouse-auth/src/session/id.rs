//! Session identifiers and signed cookie values

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::utils::CryptoUtils;
use crate::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Length of generated session ids
pub const SESSION_ID_LENGTH: usize = 32;

/// Opaque session identifier: 32 random alphanumeric characters.
///
/// Parsing only accepts that shape, so an id is always safe to use as a
/// file name or map key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random session id
    pub fn generate() -> Self {
        Self(CryptoUtils::generate_session_id())
    }

    /// Parse and validate a session id
    pub fn from_string(value: impl Into<String>) -> AuthResult<Self> {
        let value = value.into();
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(AuthError::session_error("Malformed session id"))
        }
    }

    pub fn is_valid(value: &str) -> bool {
        value.len() == SESSION_ID_LENGTH && value.chars().all(|c| c.is_ascii_alphanumeric())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Session ids are bearer credentials; keep them out of debug output.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}…)", &self.0[..4.min(self.0.len())])
    }
}

/// Signs session ids for use as cookie values: `s:<id>.<hex hmac-sha256>`
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    pub fn new(secret: &str) -> AuthResult<Self> {
        if secret.is_empty() {
            return Err(AuthError::config_error("Session secret must not be empty"));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AuthError::crypto_error(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Produce the cookie value for a session id
    pub fn sign(&self, id: &SessionId) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_str().as_bytes());
        format!("s:{}.{}", id, hex::encode(mac.finalize().into_bytes()))
    }

    /// Recover the session id from a cookie value. Any malformed value or
    /// signature mismatch yields `None`.
    pub fn unsign(&self, value: &str) -> Option<SessionId> {
        let (id, signature) = value.strip_prefix("s:")?.split_once('.')?;
        let id = SessionId::from_string(id).ok()?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(id.as_str().as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(id)
    }
}

impl fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CookieSigner { .. }")
    }
}
