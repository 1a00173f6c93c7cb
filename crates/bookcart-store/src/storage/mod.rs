//! # Durable Storage
//!
//! A per-origin key-value store shared by several execution contexts (tabs
//! or processes), plus the notification channel that tells each context
//! when *another* context changed a key.
//!
//! ## Notification Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One origin, three contexts                          │
//! │                                                                         │
//! │   Tab A ── set_item("shopping-cart", v2) ──┐                            │
//! │                                            ▼                            │
//! │                                   ┌─────────────────┐                   │
//! │                                   │  shared slot    │  last writer wins │
//! │                                   │  "shopping-cart"│                   │
//! │                                   └────────┬────────┘                   │
//! │                                            │ StorageEvent               │
//! │                         ┌──────────────────┼─────────────────┐          │
//! │                         ▼                  ▼                 ▼          │
//! │                      Tab A              Tab B             Tab C         │
//! │                   (filtered out)     (delivered)       (delivered)      │
//! │                                                                         │
//! │  • No event for the writer's own context                                │
//! │  • No event when the written value equals the stored one                │
//! │  • Removal events carry new_value = None                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Backends
//! - [`memory`] - in-process origin; contexts opened from one `StorageOrigin`
//! - [`file`] - a directory per origin, polled for writes by other processes

pub mod file;
pub mod memory;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

pub use file::{FileStorage, FileWatcher};
pub use memory::{MemoryStorage, StorageOrigin};

/// Default number of notifications buffered per subscriber before it lags.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

// =============================================================================
// Context Identity
// =============================================================================

/// Identifies one execution context (a tab, a window, a process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Source used for writes observed from outside this process, where the
    /// writer's identity is unknown.
    pub const EXTERNAL: ContextId = ContextId(Uuid::nil());

    /// Creates a fresh context id.
    pub fn new() -> Self {
        ContextId(Uuid::new_v4())
    }

    /// Returns true for [`ContextId::EXTERNAL`].
    pub fn is_external(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// A key changed in another context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    /// The key that changed.
    pub key: String,

    /// Value before the change, if the writer knew it.
    pub old_value: Option<String>,

    /// Value after the change. `None` means the key was removed.
    pub new_value: Option<String>,

    /// Context that made the change.
    pub source: ContextId,

    /// When the change was observed.
    pub at: DateTime<Utc>,
}

impl StorageEvent {
    pub(crate) fn new(
        key: &str,
        old_value: Option<String>,
        new_value: Option<String>,
        source: ContextId,
    ) -> Self {
        StorageEvent {
            key: key.to_string(),
            old_value,
            new_value,
            source,
            at: Utc::now(),
        }
    }
}

/// What a subscription yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSignal {
    /// Another context changed a key.
    Event(StorageEvent),

    /// This subscriber fell behind and `n` notifications were dropped.
    /// The current value has to be re-read from storage.
    Lagged(u64),
}

/// A subscription to notifications from other contexts.
///
/// Writes made by the subscribing context itself are filtered out here, so
/// callers never see their own changes echoed back.
#[derive(Debug)]
pub struct StorageEvents {
    rx: broadcast::Receiver<StorageEvent>,
    context: ContextId,
}

impl StorageEvents {
    pub(crate) fn new(rx: broadcast::Receiver<StorageEvent>, context: ContextId) -> Self {
        StorageEvents { rx, context }
    }

    /// Waits for the next foreign notification.
    ///
    /// Returns `None` once every writer handle for the origin is gone.
    pub async fn next(&mut self) -> Option<StorageSignal> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.source == self.context => continue,
                Ok(event) => return Some(StorageSignal::Event(event)),
                Err(RecvError::Lagged(n)) => return Some(StorageSignal::Lagged(n)),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next queued foreign notification without waiting.
    pub fn try_next(&mut self) -> Option<StorageSignal> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.source == self.context => continue,
                Ok(event) => return Some(StorageSignal::Event(event)),
                Err(TryRecvError::Lagged(n)) => return Some(StorageSignal::Lagged(n)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

// =============================================================================
// Storage Area
// =============================================================================

/// One execution context's view of a durable per-origin key-value store.
///
/// All operations are synchronous and complete before returning. There is
/// no compare-and-swap: concurrent writers are ordered purely by who wrote
/// last.
pub trait StorageArea: Send + Sync + fmt::Debug {
    /// Reads a key.
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a key, notifying other contexts if the value changed.
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes a key, notifying other contexts if it existed.
    fn remove_item(&self, key: &str) -> StoreResult<()>;

    /// Subscribes to changes made by other contexts.
    fn subscribe(&self) -> StorageEvents;

    /// This context's identity.
    fn context_id(&self) -> ContextId;
}

/// Checks that a key can be stored by every backend.
///
/// ```rust
/// use bookcart_store::storage::validate_key;
///
/// assert!(validate_key("shopping-cart").is_ok());
/// assert!(validate_key("../etc/passwd").is_err());
/// ```
pub fn validate_key(key: &str) -> StoreResult<()> {
    let allowed = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');

    if key.is_empty() || !allowed || key.starts_with('.') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("shopping-cart").is_ok());
        assert!(validate_key("cart_v2.backup").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("with space").is_err());
    }

    #[test]
    fn test_context_ids_are_distinct() {
        let a = ContextId::new();
        let b = ContextId::new();
        assert_ne!(a, b);
        assert!(!a.is_external());
        assert!(ContextId::EXTERNAL.is_external());
    }

    #[test]
    fn test_subscription_filters_own_writes() {
        let (tx, rx) = broadcast::channel(8);
        let me = ContextId::new();
        let other = ContextId::new();
        let mut events = StorageEvents::new(rx, me);

        tx.send(StorageEvent::new("k", None, Some("mine".into()), me))
            .unwrap();
        tx.send(StorageEvent::new("k", None, Some("theirs".into()), other))
            .unwrap();

        match events.try_next() {
            Some(StorageSignal::Event(event)) => {
                assert_eq!(event.new_value.as_deref(), Some("theirs"));
                assert_eq!(event.source, other);
            }
            other => panic!("unexpected signal: {:?}", other),
        }
        assert_eq!(events.try_next(), None);
    }

    #[test]
    fn test_subscription_reports_lag() {
        let (tx, rx) = broadcast::channel(2);
        let mut events = StorageEvents::new(rx, ContextId::new());
        let other = ContextId::new();

        for i in 0..5 {
            tx.send(StorageEvent::new("k", None, Some(i.to_string()), other))
                .unwrap();
        }

        assert_eq!(events.try_next(), Some(StorageSignal::Lagged(3)));
    }
}
