//! # In-Process Storage Origin
//!
//! All contexts opened from one [`StorageOrigin`] share a single map and a
//! single notification channel, the way every tab of one browser profile
//! shares one origin's local storage.
//!
//! ```rust
//! use bookcart_store::storage::{StorageArea, StorageOrigin, StorageSignal};
//!
//! let origin = StorageOrigin::new();
//! let tab_a = origin.open_context();
//! let tab_b = origin.open_context();
//!
//! let mut b_events = tab_b.subscribe();
//! tab_a.set_item("shopping-cart", "{}").unwrap();
//!
//! assert_eq!(tab_b.get_item("shopping-cart").unwrap().as_deref(), Some("{}"));
//! assert!(matches!(b_events.try_next(), Some(StorageSignal::Event(_))));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use super::{ContextId, StorageArea, StorageEvent, StorageEvents, DEFAULT_EVENT_CAPACITY};
use crate::error::StoreResult;

#[derive(Debug)]
struct OriginShared {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl OriginShared {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Storage Origin
// =============================================================================

/// A shared in-memory origin that hands out per-context views.
#[derive(Debug, Clone)]
pub struct StorageOrigin {
    shared: Arc<OriginShared>,
}

impl StorageOrigin {
    /// Creates an empty origin with the default notification buffer.
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates an empty origin buffering up to `capacity` notifications per
    /// subscriber.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        StorageOrigin {
            shared: Arc::new(OriginShared {
                entries: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Opens a new execution context on this origin.
    pub fn open_context(&self) -> MemoryStorage {
        MemoryStorage {
            shared: Arc::clone(&self.shared),
            context: ContextId::new(),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.shared.entries().len()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.shared.entries().is_empty()
    }
}

impl Default for StorageOrigin {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Memory Storage
// =============================================================================

/// One context's view of a [`StorageOrigin`].
#[derive(Debug)]
pub struct MemoryStorage {
    shared: Arc<OriginShared>,
    context: ContextId,
}

impl MemoryStorage {
    // Sent while the map lock is held so notification order matches write order.
    fn publish(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        let event = StorageEvent::new(key, old_value, new_value, self.context);
        // No subscribers is fine: nobody else is listening yet.
        let _ = self.shared.events.send(event);
    }
}

impl StorageArea for MemoryStorage {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.shared.entries().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.shared.entries();
        let old = entries.insert(key.to_string(), value.to_string());
        if old.as_deref() != Some(value) {
            self.publish(key, old, Some(value.to_string()));
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.shared.entries();
        if let Some(old) = entries.remove(key) {
            self.publish(key, Some(old), None);
        }
        Ok(())
    }

    fn subscribe(&self) -> StorageEvents {
        StorageEvents::new(self.shared.events.subscribe(), self.context)
    }

    fn context_id(&self) -> ContextId {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageSignal;

    fn expect_event(events: &mut StorageEvents) -> StorageEvent {
        match events.try_next() {
            Some(StorageSignal::Event(event)) => event,
            other => panic!("expected an event, got {:?}", other),
        }
    }

    #[test]
    fn test_contexts_share_values() {
        let origin = StorageOrigin::new();
        let a = origin.open_context();
        let b = origin.open_context();

        a.set_item("k", "v1").unwrap();
        assert_eq!(b.get_item("k").unwrap().as_deref(), Some("v1"));

        b.remove_item("k").unwrap();
        assert_eq!(a.get_item("k").unwrap(), None);
        assert!(origin.is_empty());
    }

    #[test]
    fn test_writer_does_not_see_own_event() {
        let origin = StorageOrigin::new();
        let a = origin.open_context();
        let b = origin.open_context();
        let mut a_events = a.subscribe();
        let mut b_events = b.subscribe();

        a.set_item("k", "v1").unwrap();

        assert_eq!(a_events.try_next(), None);
        let event = expect_event(&mut b_events);
        assert_eq!(event.key, "k");
        assert_eq!(event.old_value, None);
        assert_eq!(event.new_value.as_deref(), Some("v1"));
        assert_eq!(event.source, a.context_id());
    }

    #[test]
    fn test_unchanged_write_is_silent() {
        let origin = StorageOrigin::new();
        let a = origin.open_context();
        let b = origin.open_context();
        let mut b_events = b.subscribe();

        a.set_item("k", "same").unwrap();
        a.set_item("k", "same").unwrap();

        expect_event(&mut b_events);
        assert_eq!(b_events.try_next(), None);
    }

    #[test]
    fn test_removal_event_has_no_new_value() {
        let origin = StorageOrigin::new();
        let a = origin.open_context();
        let b = origin.open_context();
        a.set_item("k", "v1").unwrap();
        let mut b_events = b.subscribe();

        a.remove_item("k").unwrap();
        a.remove_item("k").unwrap();

        let event = expect_event(&mut b_events);
        assert_eq!(event.old_value.as_deref(), Some("v1"));
        assert_eq!(event.new_value, None);
        assert_eq!(b_events.try_next(), None);
    }

    #[test]
    fn test_last_writer_wins() {
        let origin = StorageOrigin::new();
        let a = origin.open_context();
        let b = origin.open_context();

        a.set_item("k", "from-a").unwrap();
        b.set_item("k", "from-b").unwrap();

        assert_eq!(a.get_item("k").unwrap().as_deref(), Some("from-b"));
        assert_eq!(origin.len(), 1);
    }
}
