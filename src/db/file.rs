//! JSON file account store
//!
//! Keeps every account in one JSON object keyed by identity key. The whole file is
//! rewritten on each `put` (write to a temp file, then rename), which is fine for
//! the account volumes a single platform instance sees.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{AccountRecord, AccountStore};
use crate::identity::IdentityKey;
use crate::types::Result;

/// Account store persisted to a JSON file
#[derive(Debug)]
pub struct JsonFileAccountStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileAccountStore {
    /// Open (or lazily create) the store at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        info!("Account store at {}", path.display());

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, AccountRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, records: &BTreeMap<String, AccountRecord>) -> Result<()> {
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccountStore for JsonFileAccountStore {
    async fn put(&self, record: &AccountRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let key = record.identity_key().to_string();
        debug!("Writing account {} to {}", key, self.path.display());
        records.insert(key, record.clone());
        self.save(&records).await
    }

    async fn get(&self, key: &IdentityKey) -> Result<Option<AccountRecord>> {
        let mut records = self.load().await?;
        Ok(records.remove(&key.to_string()))
    }

    async fn list(&self) -> Result<Vec<AccountRecord>> {
        Ok(self.load().await?.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccountRole;
    use crate::db::ProfileFields;
    use crate::identity::IdentityKeyCodec;
    use crate::types::AccessError;

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let key = IdentityKeyCodec::default().mint();
        let record = AccountRecord::new(
            key.clone(),
            AccountRole::Certification,
            ProfileFields::new().with("name", "Verifier Srl"),
        );

        {
            let store = JsonFileAccountStore::open(&path).await.unwrap();
            store.put(&record).await.unwrap();
        }

        let store = JsonFileAccountStore::open(&path).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(record));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileAccountStore::open(dir.path().join("nested/accounts.json"))
            .await
            .unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileAccountStore::open(&path).await.unwrap();
        let key = IdentityKeyCodec::default().mint();
        assert!(matches!(
            store.get(&key).await,
            Err(AccessError::Serialization(_))
        ));
    }
}
