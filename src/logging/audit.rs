//! Access audit trail
//!
//! Writes one JSON line per [`AccessEvent`] to an append-only file. The logger is
//! fed from an event bus subscription, so flows never call it directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::auth::AccountRole;
use crate::events::AccessEvent;
use crate::identity::IdentityKey;

/// One line of the audit trail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// `registered`, `signed_in`, `signed_out` or `session_expired`
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_key: Option<IdentityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<AccountRole>,
    /// Instance that wrote the entry
    pub host_id: String,
}

impl AuditEntry {
    pub fn from_event(event: &AccessEvent, host_id: &str, timestamp: DateTime<Utc>) -> Self {
        let (identity_key, role) = match event {
            AccessEvent::Registered { identity_key, role }
            | AccessEvent::SignedIn { identity_key, role } => {
                (Some(identity_key.clone()), Some(*role))
            }
            AccessEvent::SignedOut | AccessEvent::SessionExpired => (None, None),
        };

        Self {
            timestamp,
            event: event.name().to_string(),
            identity_key,
            role,
            host_id: host_id.to_string(),
        }
    }

    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Audit logger writing JSONL. Without a file it only emits `debug!` lines.
#[derive(Clone)]
pub struct AuditLogger {
    inner: Arc<Mutex<AuditLoggerInner>>,
    host_id: String,
}

struct AuditLoggerInner {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl AuditLogger {
    pub fn new(host_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AuditLoggerInner {
                writer: None,
                path: None,
            })),
            host_id: host_id.into(),
        }
    }

    /// Append entries to `path`, creating it (and its directory) if needed
    pub async fn init_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut inner = self.inner.lock().await;
        inner.writer = Some(BufWriter::new(file));
        inner.path = Some(path.clone());

        info!("Audit logging to {}", path.display());
        Ok(())
    }

    pub async fn path(&self) -> Option<PathBuf> {
        self.inner.lock().await.path.clone()
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    /// Record one event
    pub async fn record(&self, event: &AccessEvent) {
        let entry = AuditEntry::from_event(event, &self.host_id, Utc::now());
        let line = match entry.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit entry: {}", e);
                return;
            }
        };
        debug!(target: "fagri_access::audit", "{}", line);

        let mut inner = self.inner.lock().await;
        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", line) {
                error!("Failed to write audit entry: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        }
    }

    /// Record events from `rx` until every sender is dropped
    pub async fn run(self, mut rx: broadcast::Receiver<AccessEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.record(&event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Audit log fell behind, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Audit subscription closed");
    }

    /// Run the subscription loop on a background task
    pub fn spawn(&self, rx: broadcast::Receiver<AccessEvent>) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(rx))
    }
}
