//! In-memory account store

use dashmap::DashMap;
use tracing::debug;

use super::{AccountRecord, AccountStore};
use crate::identity::IdentityKey;
use crate::types::Result;

/// Account store backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    records: DashMap<String, AccountRecord>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl AccountStore for MemoryAccountStore {
    async fn put(&self, record: &AccountRecord) -> Result<()> {
        let key = record.identity_key().to_string();
        debug!("Storing account {} ({})", key, record.role());
        self.records.insert(key, record.clone());
        Ok(())
    }

    async fn get(&self, key: &IdentityKey) -> Result<Option<AccountRecord>> {
        Ok(self.records.get(&key.to_string()).map(|r| r.clone()))
    }

    async fn list(&self) -> Result<Vec<AccountRecord>> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}
