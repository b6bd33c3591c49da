//! Account persistence
//!
//! The account store is an external key-value collaborator keyed by identity key.
//! Two backends ship with the crate: an in-memory map and a single JSON file.

pub mod file;
pub mod memory;
pub mod schemas;

pub use file::JsonFileAccountStore;
pub use memory::MemoryAccountStore;
pub use schemas::{AccountRecord, Metadata, ProfileFields};

use crate::identity::IdentityKey;
use crate::types::Result;

/// Trait for account persistence (allows swapping backends and mocking in tests)
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert or replace the record stored under its identity key
    async fn put(&self, record: &AccountRecord) -> Result<()>;

    /// Look up a record by identity key
    async fn get(&self, key: &IdentityKey) -> Result<Option<AccountRecord>>;

    /// All stored records
    async fn list(&self) -> Result<Vec<AccountRecord>>;
}
