//! Common metadata for persisted records
//!
//! Tracks creation and last-update timestamps. Serialized flat into the parent
//! record as `createdAt` / `lastUpdated` (RFC 3339).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation and update timestamps
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// When the record was created
    pub created_at: DateTime<Utc>,

    /// When the record was last changed
    pub last_updated: DateTime<Utc>,
}

impl Metadata {
    /// Create new metadata with current timestamp
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Create metadata for a given creation time
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_updated: now,
        }
    }

    /// Mark the record as changed now
    pub fn touch(&mut self) {
        self.last_updated = Utc::now().max(self.created_at);
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

