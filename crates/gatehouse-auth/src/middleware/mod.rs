//! Authentication logic for middleware integration
//!
//! Framework-agnostic: handlers pass in the raw `Cookie` header and get back
//! typed state plus `Set-Cookie` values to send.

pub mod guards;
pub mod session;

// Re-exports for convenient access
pub use guards::{require_authenticated, RequireAuth};
pub use session::{
    AuthState, CookieSameSite, LoginOutcome, RequestSession, SessionBinder, SessionBinderBuilder,
    SessionCookieConfig,
};
