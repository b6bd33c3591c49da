//! Access events
//!
//! Flows and the session store publish what happened on a broadcast channel.
//! Routing, notification and audit collaborators subscribe instead of polling.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::auth::AccountRole;
use crate::identity::IdentityKey;

/// Default channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something a collaborator may want to react to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessEvent {
    /// Registration completed and the account was persisted
    Registered {
        identity_key: IdentityKey,
        role: AccountRole,
    },
    /// Sign-in completed; route the user by role
    SignedIn {
        identity_key: IdentityKey,
        role: AccountRole,
    },
    /// Explicit sign-out
    SignedOut,
    /// A reader found the session past its lifetime
    SessionExpired,
}

impl AccessEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AccessEvent::Registered { .. } => "registered",
            AccessEvent::SignedIn { .. } => "signed_in",
            AccessEvent::SignedOut => "signed_out",
            AccessEvent::SessionExpired => "session_expired",
        }
    }
}

/// Cloneable publish/subscribe handle
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AccessEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: AccessEvent) {
        trace!("Publishing access event: {}", event.name());
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AccessEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
