//! # gatehouse-auth: username/password authentication with server-side sessions
//!
//! Password hashing (argon2, bcrypt), a durable user store, pluggable
//! credential strategies, identity serialization and a session binder that
//! restores the authenticated user for each request.
//!
//! ```no_run
//! use gatehouse_auth::{AuthConfig, AuthService, LoginOutcome};
//!
//! # async fn run() -> gatehouse_auth::AuthResult<()> {
//! let service = AuthService::from_config(AuthConfig::from_env()?)?;
//! service.register("alice", "secret1").await?;
//!
//! let mut session = service.binder().restore(None).await?;
//! if let LoginOutcome::LoggedIn { set_cookie, .. } =
//!     service.binder().login(&mut session, "alice", "secret1").await?
//! {
//!     println!("Set-Cookie: {}", set_cookie);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod providers;
pub mod service;
pub mod session;
pub mod store;
pub mod traits;
pub mod user;
pub mod utils;

// Error handling
pub use error::AuthError;

// Core traits
pub use traits::{
    AuthOutcome, CredentialStrategy, PasswordHasher, Rejection, SessionRecord, SessionStore,
    UserRepository,
};

// Configuration
pub use config::{AuthConfig, Environment, PasswordConfig, SessionConfig, UserStoreConfig};
pub use logging::{init_logging, LoggingConfig};

// Components
pub use middleware::{
    require_authenticated, AuthState, LoginOutcome, RequestSession, RequireAuth, SessionBinder,
    SessionBinderBuilder, SessionCookieConfig,
};
pub use providers::LocalStrategy;
pub use service::AuthService;
pub use session::{FileSessionStore, IdentitySerializer, MemorySessionStore, SessionId};
pub use store::{FileUserStore, MemoryUserStore};
pub use user::{User, UserId, UserProfile};

/// Authentication result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication system version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
