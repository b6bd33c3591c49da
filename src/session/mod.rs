//! Session management
//!
//! Tracks the currently authenticated identity key and role.

pub mod store;

pub use store::{Session, SessionStore, DEFAULT_SESSION_TTL_SECS};
