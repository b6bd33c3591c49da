//! Authenticated session state
//!
//! One session per store: committing overwrites, clearing signs out. Expiry is a
//! pure time comparison made by whoever reads the session.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{AccountRole, Destination};
use crate::events::{AccessEvent, EventBus};
use crate::identity::IdentityKey;

/// Default session lifetime (1 hour)
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Upper bound accepted for a session lifetime (100 years)
const MAX_SESSION_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Current authentication state.
///
/// Serialized with exactly the storage keys `identityKey`, `role`, `signedIn`
/// and `establishedAt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub identity_key: Option<IdentityKey>,

    #[serde(default)]
    pub role: Option<AccountRole>,

    #[serde(default)]
    pub signed_in: bool,

    #[serde(default)]
    pub established_at: Option<DateTime<Utc>>,
}

impl Session {
    /// The signed-out default
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// A signed-in session established at `at`
    pub fn signed_in(identity_key: IdentityKey, role: AccountRole, at: DateTime<Utc>) -> Self {
        Self {
            identity_key: Some(identity_key),
            role: Some(role),
            signed_in: true,
            established_at: Some(at),
        }
    }

    /// Whether a signed-in session has outlived `ttl` at `now`.
    ///
    /// Signed-out sessions never expire. A signed-in session without an
    /// establishment time is treated as expired.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        if !self.signed_in {
            return false;
        }
        match self.established_at {
            Some(at) => now - at >= ttl,
            None => true,
        }
    }

    /// Routing destination for a signed-in session
    pub fn destination(&self) -> Option<Destination> {
        if !self.signed_in {
            return None;
        }
        self.role.map(|role| role.destination())
    }
}

/// Process-wide session store with optional file persistence.
///
/// Shared as `Arc<SessionStore>`. The last writer wins; readers should call
/// `read`/`check` each time instead of caching the result.
#[derive(Debug)]
pub struct SessionStore {
    current: RwLock<Session>,
    ttl: Duration,
    path: Option<PathBuf>,
    events: EventBus,
}

impl SessionStore {
    /// In-memory store with the given lifetime
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            current: RwLock::new(Session::signed_out()),
            ttl: Duration::seconds(ttl_seconds.min(MAX_SESSION_TTL_SECS) as i64),
            path: None,
            events: EventBus::new(),
        }
    }

    /// Store persisted at `path`, restoring any session already saved there.
    ///
    /// An unreadable snapshot is logged and replaced by the signed-out default.
    pub fn open(path: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        let path = path.into();
        let mut store = Self::new(ttl_seconds);

        match load_snapshot(&path) {
            Ok(Some(session)) => {
                debug!("Restored session from {}", path.display());
                store.current = RwLock::new(session);
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable session file {}: {}", path.display(), e),
        }

        store.path = Some(path);
        store
    }

    /// Publish events on an existing bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to session changes (sign-in, sign-out, expiry)
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AccessEvent> {
        self.events.subscribe()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Overwrite the current session
    pub fn commit(&self, session: Session) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = session;
        self.persist(&current);
        if let (true, Some(key)) = (current.signed_in, current.identity_key.as_ref()) {
            info!("Session committed for {}", key);
        }
    }

    /// Current session, or the signed-out default
    pub fn read(&self) -> Session {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Sign out
    pub fn clear(&self) {
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = Session::signed_out();
            self.persist(&current);
        }
        info!("Session cleared");
        self.events.publish(AccessEvent::SignedOut);
    }

    /// Whether the stored session has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.read().is_expired(now, self.ttl)
    }

    /// Read the session, treating an expired one as signed out.
    ///
    /// The first reader to notice expiry clears the store and raises
    /// `AccessEvent::SessionExpired`.
    pub fn check(&self, now: DateTime<Utc>) -> Session {
        let session = self.read();
        if !session.is_expired(now, self.ttl) {
            return session;
        }

        let expired_here = {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            // Another reader or a fresh sign-in may have replaced it meanwhile
            if current.is_expired(now, self.ttl) {
                *current = Session::signed_out();
                self.persist(&current);
                true
            } else {
                false
            }
        };

        if expired_here {
            warn!("Session expired");
            self.events.publish(AccessEvent::SessionExpired);
        }
        self.read()
    }

    fn persist(&self, session: &Session) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = save_snapshot(path, session) {
            warn!("Failed to persist session to {}: {}", path.display(), e);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL_SECS)
    }
}

fn load_snapshot(path: &Path) -> crate::Result<Option<Session>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn save_snapshot(path: &Path, session: &Session) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
