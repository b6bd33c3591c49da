//! Persisted record schemas
//!
//! Defines the account record written to the account store.

mod account;
mod metadata;

pub use account::{AccountRecord, ProfileFields, DEFAULT_REQUIRED_FIELDS};
pub use metadata::Metadata;
