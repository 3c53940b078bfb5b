//! Credential strategy implementations
//!
//! Only the local (username/password against the user store) strategy ships
//! here; other backends implement [`crate::CredentialStrategy`] directly.

pub mod local;

pub use local::LocalStrategy;
