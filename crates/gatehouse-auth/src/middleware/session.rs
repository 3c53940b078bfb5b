//! Session binding middleware
//!
//! Restores the authenticated identity for each request from the session
//! cookie, and binds or unbinds identities on login and logout. The session
//! store is read on every request but only written on login and logout.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::config::{SessionConfig, MAX_SESSION_TTL};
use crate::session::{CookieSigner, IdentitySerializer, SessionId};
use crate::traits::{AuthOutcome, CredentialStrategy, Rejection, SessionRecord, SessionStore};
use crate::user::User;
use crate::{AuthError, AuthResult, UserRepository};

/// Cookie SameSite attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieSameSite {
    Strict,
    Lax,
    None,
}

impl std::fmt::Display for CookieSameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CookieSameSite::Strict => write!(f, "Strict"),
            CookieSameSite::Lax => write!(f, "Lax"),
            CookieSameSite::None => write!(f, "None"),
        }
    }
}

impl std::str::FromStr for CookieSameSite {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Strict" => Ok(CookieSameSite::Strict),
            "Lax" => Ok(CookieSameSite::Lax),
            "None" => Ok(CookieSameSite::None),
            other => Err(AuthError::config_error(format!("Invalid SameSite policy: {}", other))),
        }
    }
}

/// Session cookie attributes
#[derive(Debug, Clone)]
pub struct SessionCookieConfig {
    /// Cookie name for session ID
    pub cookie_name: String,

    /// Session cookie domain
    pub cookie_domain: Option<String>,

    /// Session cookie path
    pub cookie_path: String,

    /// Whether session cookie is HTTP-only
    pub cookie_http_only: bool,

    /// Whether session cookie is secure (HTTPS only)
    pub cookie_secure: bool,

    /// Session cookie SameSite attribute
    pub cookie_same_site: CookieSameSite,
}

impl Default for SessionCookieConfig {
    fn default() -> Self {
        Self {
            cookie_name: "gatehouse.sid".to_string(),
            cookie_domain: None,
            cookie_path: "/".to_string(),
            cookie_http_only: true,
            cookie_secure: false,
            cookie_same_site: CookieSameSite::Lax,
        }
    }
}

impl SessionCookieConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build cookie attributes from the session configuration
    pub fn from_config(config: &SessionConfig) -> AuthResult<Self> {
        Ok(Self {
            cookie_name: config.cookie_name.clone(),
            cookie_domain: config.cookie_domain.clone(),
            cookie_path: config.cookie_path.clone(),
            cookie_http_only: config.cookie_http_only,
            cookie_secure: config.cookie_secure,
            cookie_same_site: config.cookie_same_site.parse()?,
        })
    }

    /// Set cookie name
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set cookie domain
    pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    /// Set whether cookie is secure
    pub fn cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Set cookie SameSite attribute
    pub fn cookie_same_site(mut self, same_site: CookieSameSite) -> Self {
        self.cookie_same_site = same_site;
        self
    }

    /// Extract this cookie's raw value from a `Cookie` header
    pub fn extract_cookie_value<'a>(&self, cookie_header: &'a str) -> Option<&'a str> {
        cookie_header.split(';').find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == self.cookie_name).then_some(value)
        })
    }

    /// Render a `Set-Cookie` header value
    pub fn create_cookie_header(&self, value: &str, max_age: Option<i64>) -> String {
        let mut cookie = format!("{}={}", self.cookie_name, value);

        if let Some(domain) = &self.cookie_domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }

        cookie.push_str(&format!("; Path={}", self.cookie_path));

        if self.cookie_http_only {
            cookie.push_str("; HttpOnly");
        }

        if self.cookie_secure {
            cookie.push_str("; Secure");
        }

        cookie.push_str(&format!("; SameSite={}", self.cookie_same_site));

        if let Some(max_age) = max_age {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }

        cookie
    }

    /// Render a `Set-Cookie` header value that removes the cookie
    pub fn clear_cookie_header(&self) -> String {
        self.create_cookie_header("", Some(0))
    }
}

/// Authentication state of a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(User),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Anonymous => None,
        }
    }
}

/// Per-request session handle produced by [`SessionBinder::restore`]
#[derive(Debug, Clone)]
pub struct RequestSession {
    token: Option<SessionId>,
    state: AuthState,
}

impl RequestSession {
    /// A request without a session
    pub fn anonymous() -> Self {
        Self {
            token: None,
            state: AuthState::Anonymous,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn user(&self) -> Option<&User> {
        self.state.user()
    }

    pub fn token(&self) -> Option<&SessionId> {
        self.token.as_ref()
    }
}

/// Result of a login attempt that did not fail with an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The session is now bound to `user`; send `set_cookie` back
    LoggedIn { user: User, set_cookie: String },
    /// Credentials refused; the session was left untouched
    Rejected(Rejection),
}

/// Binds authenticated identities to sessions
pub struct SessionBinder {
    strategy: Arc<dyn CredentialStrategy>,
    identity: IdentitySerializer,
    sessions: Arc<dyn SessionStore>,
    signer: CookieSigner,
    cookie: SessionCookieConfig,
    ttl: Duration,
}

impl SessionBinder {
    /// Get middleware name
    pub fn name(&self) -> &str {
        "session"
    }

    pub fn cookie_config(&self) -> &SessionCookieConfig {
        &self.cookie
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Restore the request's authentication state from its `Cookie` header.
    ///
    /// Missing, unsigned, expired and unknown sessions are all anonymous. A
    /// session bound to a user that no longer exists is destroyed.
    pub async fn restore(&self, cookie_header: Option<&str>) -> AuthResult<RequestSession> {
        let Some(token) = cookie_header
            .and_then(|header| self.cookie.extract_cookie_value(header))
            .and_then(|value| self.signer.unsign(value))
        else {
            return Ok(RequestSession::anonymous());
        };

        let Some(record) = self.sessions.load(token.as_str()).await? else {
            return Ok(RequestSession::anonymous());
        };

        let Some(user_id) = record.user_id else {
            return Ok(RequestSession {
                token: Some(token),
                state: AuthState::Anonymous,
            });
        };

        match self.identity.deserialize(user_id).await? {
            Some(user) => Ok(RequestSession {
                token: Some(token),
                state: AuthState::Authenticated(user),
            }),
            None => {
                tracing::warn!(user_id, "Discarding session bound to an unknown user");
                if let Err(e) = self.sessions.destroy(token.as_str()).await {
                    tracing::warn!(user_id, error = %e, "Failed to destroy stale session");
                }
                Ok(RequestSession::anonymous())
            }
        }
    }

    /// Verify credentials and, on success, bind the user to a freshly issued
    /// session id. Any previous session of this request is destroyed.
    pub async fn login(
        &self,
        session: &mut RequestSession,
        username: &str,
        password: &str,
    ) -> AuthResult<LoginOutcome> {
        let user = match self.strategy.authenticate(username, password).await? {
            AuthOutcome::Authenticated(user) => user,
            AuthOutcome::Rejected(reason) => {
                tracing::info!(username = %username, strategy = self.strategy.strategy_name(), "Login rejected");
                return Ok(LoginOutcome::Rejected(reason));
            }
        };

        let token = SessionId::generate();
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::session_error("Session expiry out of range"))?;
        let record = SessionRecord {
            user_id: Some(self.identity.serialize(&user)),
            created_at: now,
            expires_at,
        };
        self.sessions.save(token.as_str(), record).await?;

        if let Some(previous) = &session.token {
            if let Err(e) = self.sessions.destroy(previous.as_str()).await {
                tracing::warn!(error = %e, "Failed to destroy previous session");
            }
        }

        let set_cookie = self
            .cookie
            .create_cookie_header(&self.signer.sign(&token), Some(self.ttl.num_seconds()));

        tracing::info!(user_id = user.id, username = %user.username, "User logged in");

        session.token = Some(token);
        session.state = AuthState::Authenticated(user.clone());

        Ok(LoginOutcome::LoggedIn { user, set_cookie })
    }

    /// Destroy the request's session. Returns the `Set-Cookie` value that
    /// clears the cookie on the client.
    pub async fn logout(&self, session: &mut RequestSession) -> AuthResult<String> {
        if let Some(token) = &session.token {
            self.sessions.destroy(token.as_str()).await?;
        }

        if let AuthState::Authenticated(user) = &session.state {
            tracing::info!(user_id = user.id, "User logged out");
        }
        session.token = None;
        session.state = AuthState::Anonymous;

        Ok(self.cookie.clear_cookie_header())
    }
}

/// Builder for [`SessionBinder`]
pub struct SessionBinderBuilder {
    strategy: Option<Arc<dyn CredentialStrategy>>,
    users: Option<Arc<dyn UserRepository>>,
    sessions: Option<Arc<dyn SessionStore>>,
    secret: Option<String>,
    cookie: SessionCookieConfig,
    ttl: Duration,
}

impl Default for SessionBinderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBinderBuilder {
    /// Create new builder
    pub fn new() -> Self {
        Self {
            strategy: None,
            users: None,
            sessions: None,
            secret: None,
            cookie: SessionCookieConfig::default(),
            ttl: Duration::hours(24),
        }
    }

    /// Set the credential strategy used by `login`
    pub fn strategy(mut self, strategy: Arc<dyn CredentialStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set the user store used to restore identities
    pub fn users(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.users = Some(users);
        self
    }

    /// Set the session store
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Set the cookie signing secret
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Set cookie attributes
    pub fn cookie(mut self, cookie: SessionCookieConfig) -> Self {
        self.cookie = cookie;
        self
    }

    /// Set the session time-to-live
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Apply secret, ttl and cookie attributes from configuration
    pub fn config(mut self, config: &SessionConfig) -> AuthResult<Self> {
        let ttl = i64::try_from(config.ttl)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| AuthError::config_error("Session ttl is too large"))?;
        self.secret = Some(config.secret.clone());
        self.ttl = ttl;
        self.cookie = SessionCookieConfig::from_config(config)?;
        Ok(self)
    }

    /// Build the binder
    pub fn build(self) -> AuthResult<SessionBinder> {
        let strategy = self
            .strategy
            .ok_or_else(|| AuthError::config_error("Credential strategy is required"))?;
        let users = self
            .users
            .ok_or_else(|| AuthError::config_error("User store is required"))?;
        let sessions = self
            .sessions
            .ok_or_else(|| AuthError::config_error("Session store is required"))?;
        let secret = self
            .secret
            .ok_or_else(|| AuthError::config_error("Session secret is required"))?;

        if self.ttl <= Duration::zero() {
            return Err(AuthError::config_error("Session ttl must be positive"));
        }
        if self.ttl.num_seconds() as u64 > MAX_SESSION_TTL {
            return Err(AuthError::config_error("Session ttl is too large"));
        }

        Ok(SessionBinder {
            strategy,
            identity: IdentitySerializer::new(users),
            sessions,
            signer: CookieSigner::new(&secret)?,
            cookie: self.cookie,
            ttl: self.ttl,
        })
    }
}
