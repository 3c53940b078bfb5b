//! Session identifiers, identity serialization and session stores

pub mod id;
pub mod identity;
pub mod storage;

pub use id::{CookieSigner, SessionId};
pub use identity::IdentitySerializer;
pub use storage::{FileSessionStore, MemorySessionStore};
