//! # Cart Store
//!
//! Owns the live [`CartState`] of one execution context, applies actions
//! through the pure reducer, writes every result through to storage and
//! follows writes made by other contexts.
//!
//! ## Control Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         One Context (Tab)                               │
//! │                                                                         │
//! │  dispatch(action)                                                       │
//! │     │                                                                   │
//! │     ├── 1. lock state                                                   │
//! │     ├── 2. next = reduce(state, action)                                 │
//! │     ├── 3. persistence.save(next)   ──────────► storage key             │
//! │     ├── 4. state = next                          │                      │
//! │     └── 5. observers.send(next)                  │ StorageEvent         │
//! │                                                  │ (other tabs only)    │
//! │                                                  ▼                      │
//! │  Other tab: handle_storage_event(event)                                 │
//! │     ├── wrong key / removal → ignored                                   │
//! │     ├── undecodable         → logged, local state kept                  │
//! │     └── decoded             → dispatch(SYNC_CART(decoded))              │
//! │                                  └── re-persists the same bytes,        │
//! │                                      which produces no new event        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery Models
//! - [`CartStore::sync_pending`] drains queued notifications on the calling
//!   thread, like an event loop turn
//! - [`CartStore::spawn_sync_listener`] follows notifications on a Tokio
//!   task until the returned [`SyncListener`] is dropped
//!
//! ## Consistency
//! The storage key is a last-writer-wins register. Two contexts that
//! dispatch at the same time both persist, and the later write is what
//! everyone converges on. Nothing is merged.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bookcart_core::{reduce, CartAction, CartState};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{CartConfig, StorageBackend};
use crate::error::StoreResult;
use crate::persistence::CartPersistence;
use crate::provider::Dispatcher;
use crate::storage::{
    ContextId, FileStorage, StorageArea, StorageEvent, StorageEvents, StorageOrigin, StorageSignal,
};

#[derive(Debug)]
struct StoreInner {
    state: Mutex<CartState>,
    persistence: CartPersistence,
    observers: watch::Sender<CartState>,
    /// Taken by the first sync listener.
    events: Mutex<Option<StorageEvents>>,
}

impl StoreInner {
    fn state(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn events(&self) -> MutexGuard<'_, Option<StorageEvents>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Cart Store
// =============================================================================

/// The cart of one execution context. Cloning shares the same cart.
#[derive(Debug, Clone)]
pub struct CartStore {
    inner: Arc<StoreInner>,
}

impl CartStore {
    /// Opens the cart stored under `key`.
    ///
    /// The subscription is taken before the initial read, so a write that
    /// lands in between is still delivered. A missing or broken stored
    /// value yields the empty cart. Nothing is written on open.
    pub fn open(storage: Arc<dyn StorageArea>, key: impl Into<String>) -> StoreResult<Self> {
        let persistence = CartPersistence::new(storage, key)?;
        let events = persistence.storage().subscribe();
        let initial = persistence.load();
        let (observers, _) = watch::channel(initial.clone());

        debug!(
            key = %persistence.key(),
            context = %persistence.storage().context_id(),
            "Opened cart store"
        );

        Ok(CartStore {
            inner: Arc::new(StoreInner {
                state: Mutex::new(initial),
                persistence,
                observers,
                events: Mutex::new(Some(events)),
            }),
        })
    }

    /// Builds storage from `config` and opens the cart in it.
    ///
    /// A memory backend gets a fresh private origin. File backends opened
    /// this way are not polled; use [`crate::CartRuntime`] to follow writes
    /// from other processes.
    pub fn from_config(config: &CartConfig) -> StoreResult<Self> {
        config.validate()?;
        let capacity = config.sync.event_capacity;

        let storage: Arc<dyn StorageArea> = match config.storage.backend {
            StorageBackend::Memory => {
                Arc::new(StorageOrigin::with_event_capacity(capacity).open_context())
            }
            StorageBackend::File => Arc::new(FileStorage::with_event_capacity(
                config.resolved_data_dir()?,
                capacity,
            )?),
        };

        Self::open(storage, config.key())
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Snapshot of the current cart.
    pub fn state(&self) -> CartState {
        self.inner.state().clone()
    }

    /// Runs `f` against the current cart without cloning it.
    pub fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&CartState) -> R,
    {
        let state = self.inner.state();
        f(&state)
    }

    /// Observes every state this store takes from now on.
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.observers.subscribe()
    }

    /// The storage key.
    pub fn key(&self) -> &str {
        self.inner.persistence.key()
    }

    /// This store's execution context.
    pub fn context_id(&self) -> ContextId {
        self.inner.persistence.storage().context_id()
    }

    /// A handle for sending actions to this store.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.clone())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Applies `action`, persists the result and notifies observers.
    ///
    /// A failed storage write is logged and does not fail the dispatch: the
    /// in-memory cart still moves on and the next successful write brings
    /// storage back in line.
    pub fn dispatch(&self, action: CartAction) -> CartState {
        let kind = action.kind();
        let target = action.target_id().map(str::to_owned);

        let mut state = self.inner.state();
        warn_on_suspicious(&state, &action);

        let next = reduce(&state, action);
        if let Err(e) = self.inner.persistence.save(&next) {
            error!(
                key = %self.key(),
                action = kind,
                error = %e,
                "Failed to persist cart"
            );
        }
        *state = next.clone();
        self.inner.observers.send_replace(next.clone());
        drop(state);

        debug!(
            action = kind,
            target = target.as_deref().unwrap_or("-"),
            lines = next.line_count(),
            total = %next.total,
            "Dispatched cart action"
        );
        next
    }

    /// Removes the stored cart, then resets every context to the empty cart.
    ///
    /// The removal itself is ignored by other contexts; the empty state that
    /// is persisted right after is what they sync to.
    pub fn clear_cart(&self) -> CartState {
        if let Err(e) = self.inner.persistence.clear() {
            error!(key = %self.key(), error = %e, "Failed to remove stored cart");
        }
        info!(key = %self.key(), "Cart cleared");
        self.dispatch(CartAction::SyncCart(CartState::empty()))
    }

    // =========================================================================
    // Cross-Context Sync
    // =========================================================================

    /// Applies a notification about another context's write.
    ///
    /// Returns true if the cart was re-synced.
    pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        if event.key != self.key() {
            return false;
        }

        let Some(raw) = event.new_value.as_deref() else {
            debug!(key = %event.key, source = %event.source, "Ignoring removal of stored cart");
            return false;
        };

        match CartPersistence::decode(raw) {
            Ok(next) => {
                debug!(source = %event.source, "Syncing cart from another context");
                self.dispatch(CartAction::SyncCart(next));
                true
            }
            Err(e) => {
                warn!(
                    key = %event.key,
                    source = %event.source,
                    error = %e,
                    "Ignoring undecodable cart written by another context"
                );
                false
            }
        }
    }

    /// Re-reads the stored cart and syncs to it if it differs.
    ///
    /// Used after notifications were dropped. Returns true if the cart was
    /// re-synced.
    pub fn resync_from_storage(&self) -> bool {
        match self.inner.persistence.read() {
            Ok(Some(stored)) => {
                if self.with_state(|current| *current == stored) {
                    return false;
                }
                self.dispatch(CartAction::SyncCart(stored));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(key = %self.key(), error = %e, "Resync skipped, stored cart unusable");
                false
            }
        }
    }

    /// Applies a batch of notifications in delivery order.
    ///
    /// Applying them one by one would end on the newest usable value and
    /// re-persist every stale one on the way, so only that newest value is
    /// applied. Returns true if the cart was re-synced.
    fn apply_signals(&self, signals: Vec<StorageSignal>) -> bool {
        let missed: u64 = signals
            .iter()
            .map(|signal| match signal {
                StorageSignal::Lagged(n) => *n,
                StorageSignal::Event(_) => 0,
            })
            .sum();

        if missed > 0 {
            warn!(key = %self.key(), missed, "Missed storage notifications, re-reading");
            return self.resync_from_storage();
        }

        signals.iter().rev().any(|signal| match signal {
            StorageSignal::Event(event) => self.handle_storage_event(event),
            StorageSignal::Lagged(_) => false,
        })
    }

    /// Drains every notification already queued for this context and syncs
    /// to the newest usable value among them.
    ///
    /// Returns the number of notifications drained. Returns 0 once a sync
    /// listener owns the subscription.
    pub fn sync_pending(&self) -> usize {
        let signals: Vec<StorageSignal> = {
            let mut events = self.inner.events();
            let Some(events) = events.as_mut() else {
                return 0;
            };
            std::iter::from_fn(|| events.try_next()).collect()
        };

        let drained = signals.len();
        if drained > 0 {
            self.apply_signals(signals);
        }
        drained
    }

    /// Follows notifications on a Tokio task.
    ///
    /// Must be called from within a Tokio runtime. The first listener takes
    /// over the subscription opened with the store; later ones subscribe
    /// afresh.
    pub fn spawn_sync_listener(&self) -> SyncListener {
        let events = self
            .inner
            .events()
            .take()
            .unwrap_or_else(|| self.inner.persistence.storage().subscribe());
        let store = self.clone();

        let handle = tokio::spawn(async move {
            let mut events = events;
            while let Some(first) = events.next().await {
                let mut batch = vec![first];
                batch.extend(std::iter::from_fn(|| events.try_next()));
                store.apply_signals(batch);
            }
            debug!(key = %store.key(), "Storage notifications closed, sync listener exiting");
        });

        SyncListener { handle }
    }
}

fn warn_on_suspicious(state: &CartState, action: &CartAction) {
    match action {
        CartAction::AddToCart(item) => {
            if let Some(existing) = state.find(&item.id) {
                if existing.price != item.price {
                    warn!(
                        id = %item.id,
                        existing = %existing.price,
                        incoming = %item.price,
                        "Merging line with a different price; total follows the incoming price"
                    );
                }
            }
        }
        CartAction::SyncCart(next) if !next.is_consistent() => {
            warn!(
                total = %next.total,
                computed = %next.computed_total(),
                "Installing inconsistent cart from storage"
            );
        }
        _ => {}
    }
}

// =============================================================================
// Sync Listener Handle
// =============================================================================

/// Handle to a running sync listener. Dropping it stops the listener.
#[derive(Debug)]
pub struct SyncListener {
    handle: JoinHandle<()>,
}

impl SyncListener {
    /// Stops following notifications.
    pub fn stop(&self) {
        self.handle.abort();
    }

    /// Returns true while the listener task is alive.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SyncListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookcart_core::{CartItem, Money, ServiceOffer};
    use std::time::Duration;

    const KEY: &str = "shopping-cart";

    fn open_tab(origin: &StorageOrigin) -> CartStore {
        CartStore::open(Arc::new(origin.open_context()), KEY).unwrap()
    }

    fn booking(id: &str, price: i64, hours: u32) -> CartItem {
        let offer = ServiceOffer::new(id, format!("Service {}", id), Money::from_major(price));
        CartItem::for_service(&offer, hours).unwrap()
    }

    fn stored(origin: &StorageOrigin) -> Option<String> {
        origin.open_context().get_item(KEY).unwrap()
    }

    #[test]
    fn test_open_on_empty_storage() {
        let origin = StorageOrigin::new();
        let store = open_tab(&origin);

        assert_eq!(store.state(), CartState::empty());
        // Nothing is written until the first dispatch
        assert_eq!(stored(&origin), None);
    }

    #[test]
    fn test_dispatch_writes_through() {
        let origin = StorageOrigin::new();
        let store = open_tab(&origin);

        let state = store.dispatch(CartAction::AddToCart(booking("x", 25, 2)));

        assert_eq!(state.total, Money::from_major(50));
        assert_eq!(store.state(), state);
        let raw = stored(&origin).unwrap();
        assert_eq!(CartPersistence::decode(&raw).unwrap(), state);
    }

    #[test]
    fn test_reload_restores_cart() {
        let origin = StorageOrigin::new();
        let before = {
            let store = open_tab(&origin);
            store.dispatch(CartAction::AddToCart(booking("a", 10, 1)));
            store.dispatch(CartAction::AddToCart(booking("b", 20, 3)))
        };

        let reloaded = open_tab(&origin);
        assert_eq!(reloaded.state(), before);
    }

    #[test]
    fn test_corrupt_storage_opens_empty_then_heals() {
        let origin = StorageOrigin::new();
        origin.open_context().set_item(KEY, "][").unwrap();

        let store = open_tab(&origin);
        assert_eq!(store.state(), CartState::empty());

        let state = store.dispatch(CartAction::AddToCart(booking("a", 10, 1)));
        let raw = stored(&origin).unwrap();
        assert_eq!(CartPersistence::decode(&raw).unwrap(), state);
    }

    #[test]
    fn test_second_tab_follows_first() {
        let origin = StorageOrigin::new();
        let tab_a = open_tab(&origin);
        let tab_b = open_tab(&origin);

        tab_a.dispatch(CartAction::AddToCart(booking("a", 10, 1)));
        tab_a.dispatch(CartAction::UpdateQuantity {
            id: "a-1".to_string(),
            quantity: 4,
        });

        assert_eq!(tab_b.sync_pending(), 2);
        assert_eq!(tab_b.state(), tab_a.state());

        // b re-persisted identical bytes, so a hears nothing back
        assert_eq!(tab_a.sync_pending(), 0);
    }

    #[test]
    fn test_writer_does_not_resync_itself() {
        let origin = StorageOrigin::new();
        let store = open_tab(&origin);

        store.dispatch(CartAction::AddToCart(booking("a", 10, 1)));
        assert_eq!(store.sync_pending(), 0);
    }

    #[test]
    fn test_last_writer_wins() {
        let origin = StorageOrigin::new();
        let tab_a = open_tab(&origin);
        let tab_b = open_tab(&origin);

        tab_a.dispatch(CartAction::AddToCart(booking("a", 10, 1)));
        tab_b.dispatch(CartAction::AddToCart(booking("b", 20, 1)));

        // Whatever ends up stored is what every tab holds once drained
        tab_a.sync_pending();
        tab_b.sync_pending();
        tab_a.sync_pending();

        let final_stored = CartPersistence::decode(&stored(&origin).unwrap()).unwrap();
        assert_eq!(tab_a.state(), final_stored);
        assert_eq!(tab_b.state(), final_stored);
    }

    #[test]
    fn test_clear_propagates_empty_cart() {
        let origin = StorageOrigin::new();
        let tab_a = open_tab(&origin);
        let tab_b = open_tab(&origin);
        tab_a.dispatch(CartAction::AddToCart(booking("a", 10, 1)));
        tab_b.sync_pending();

        let cleared = tab_a.clear_cart();

        assert_eq!(cleared, CartState::empty());
        // Removal is ignored, the empty write that follows is applied
        assert_eq!(tab_b.sync_pending(), 2);
        assert_eq!(tab_b.state(), CartState::empty());
        assert_eq!(stored(&origin).as_deref(), Some(r#"{"items":[],"total":0}"#));
    }

    #[test]
    fn test_foreign_removal_keeps_local_cart() {
        let origin = StorageOrigin::new();
        let tab_a = open_tab(&origin);
        let state = tab_a.dispatch(CartAction::AddToCart(booking("a", 10, 1)));

        origin.open_context().remove_item(KEY).unwrap();

        assert_eq!(tab_a.sync_pending(), 1);
        assert_eq!(tab_a.state(), state);
    }

    #[test]
    fn test_foreign_garbage_keeps_local_cart() {
        let origin = StorageOrigin::new();
        let tab_a = open_tab(&origin);
        let state = tab_a.dispatch(CartAction::AddToCart(booking("a", 10, 1)));

        origin.open_context().set_item(KEY, "not a cart").unwrap();

        assert_eq!(tab_a.sync_pending(), 1);
        assert_eq!(tab_a.state(), state);
    }

    #[test]
    fn test_other_keys_are_ignored() {
        let origin = StorageOrigin::new();
        let tab_a = open_tab(&origin);

        origin
            .open_context()
            .set_item("wishlist", r#"{"items":[],"total":0}"#)
            .unwrap();

        assert_eq!(tab_a.sync_pending(), 1);
        assert!(tab_a.state().is_empty());
    }

    #[test]
    fn test_inconsistent_sync_installed_verbatim() {
        let origin = StorageOrigin::new();
        let tab_a = open_tab(&origin);
        let remote = CartState {
            items: vec![booking("a", 10, 1)],
            total: Money::from_major(77),
        };

        let event = StorageEvent::new(
            KEY,
            None,
            Some(serde_json::to_string(&remote).unwrap()),
            ContextId::EXTERNAL,
        );

        assert!(tab_a.handle_storage_event(&event));
        assert_eq!(tab_a.state(), remote);
    }

    #[test]
    fn test_sync_replaces_existing_lines_exactly() {
        let origin = StorageOrigin::new();
        let tab_a = open_tab(&origin);
        let tab_b = open_tab(&origin);

        tab_b.dispatch(CartAction::AddToCart(booking("b", 20, 1)));
        tab_b.dispatch(CartAction::AddToCart(booking("c", 5, 2)));
        tab_a.sync_pending();

        tab_a.dispatch(CartAction::RemoveFromCart("b-1".to_string()));
        tab_a.dispatch(CartAction::RemoveFromCart("c-2".to_string()));
        tab_a.dispatch(CartAction::AddToCart(booking("a", 10, 3)));
        let written = tab_a.dispatch(CartAction::AddToCart(booking("a", 10, 3)));

        tab_b.sync_pending();

        assert_eq!(tab_b.state(), written);
        assert!(tab_b.state().find("b-1").is_none());
        assert_eq!(tab_b.state().find("a-3").unwrap().quantity, 2);
    }

    #[test]
    fn test_sync_with_extreme_quantity_does_not_panic() {
        let origin = StorageOrigin::new();
        let tab = open_tab(&origin);

        origin
            .open_context()
            .set_item(
                KEY,
                r#"{"items":[{"id":"a-1","name":"A","description":"1 hour(s) of A",
                    "basePrice":1,"hours":1,"price":1,"quantity":9223372036854775807}],
                    "total":0}"#,
            )
            .unwrap();

        assert_eq!(tab.sync_pending(), 1);
        assert_eq!(tab.state().items[0].quantity, i64::MAX);

        let state = tab.dispatch(CartAction::RemoveFromCart("a-1".to_string()));
        assert!(state.is_empty());
    }

    #[test]
    fn test_update_on_huge_stored_price_does_not_panic() {
        let origin = StorageOrigin::new();
        origin
            .open_context()
            .set_item(
                KEY,
                r#"{"items":[{"id":"a-1","name":"A","description":"1 hour(s) of A",
                    "basePrice":90000000000000000,"hours":1,"price":90000000000000000,
                    "quantity":1}],"total":90000000000000000}"#,
            )
            .unwrap();
        let tab = open_tab(&origin);
        assert_eq!(tab.state().line_count(), 1);

        let state = tab.dispatch(CartAction::UpdateQuantity {
            id: "a-1".to_string(),
            quantity: 3,
        });
        assert_eq!(state.total, Money::from_cents(i64::MAX));
    }

    #[test]
    fn test_non_utf8_file_cart_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shopping-cart.json"), [0xff, 0xfe, 0x00]).unwrap();
        let mut config = CartConfig::default();
        config.storage.backend = StorageBackend::File;
        config.storage.data_dir = Some(dir.path().to_path_buf());

        let store = CartStore::from_config(&config).unwrap();
        assert_eq!(store.state(), CartState::empty());

        let state = store.dispatch(CartAction::AddToCart(booking("a", 10, 1)));
        let reopened = CartStore::from_config(&config).unwrap();
        assert_eq!(reopened.state(), state);
    }

    #[test]
    fn test_lagged_subscriber_resyncs() {
        let origin = StorageOrigin::with_event_capacity(1);
        let tab_a = open_tab(&origin);
        let tab_b = open_tab(&origin);

        for hours in 1..=4 {
            tab_a.dispatch(CartAction::AddToCart(booking("a", 10, hours)));
        }

        assert!(tab_b.sync_pending() >= 1);
        assert_eq!(tab_b.state(), tab_a.state());
    }

    #[test]
    fn test_observers_see_each_state() {
        let origin = StorageOrigin::new();
        let store = open_tab(&origin);
        let mut rx = store.subscribe();

        store.dispatch(CartAction::AddToCart(booking("a", 10, 1)));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().item_count(), 1);
    }

    #[tokio::test]
    async fn test_listener_follows_other_tab() {
        let origin = StorageOrigin::new();
        let tab_a = open_tab(&origin);
        let tab_b = open_tab(&origin);
        let mut rx = tab_b.subscribe();
        let listener = tab_b.spawn_sync_listener();

        let expected = tab_a.dispatch(CartAction::AddToCart(booking("a", 10, 2)));

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("listener did not sync")
            .unwrap();
        assert_eq!(*rx.borrow(), expected);

        // The listener owns the subscription now
        assert_eq!(tab_b.sync_pending(), 0);
        assert!(listener.is_running());
        listener.stop();
    }

    #[test]
    fn test_from_config_memory_backend() {
        let store = CartStore::from_config(&CartConfig::default()).unwrap();
        assert_eq!(store.key(), "shopping-cart");
        assert!(store.state().is_empty());
    }

    #[test]
    fn test_from_config_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CartConfig::default();
        config.storage.backend = StorageBackend::File;
        config.storage.data_dir = Some(dir.path().to_path_buf());

        let store = CartStore::from_config(&config).unwrap();
        store.dispatch(CartAction::AddToCart(booking("a", 10, 1)));

        let reopened = CartStore::from_config(&config).unwrap();
        assert_eq!(reopened.state(), store.state());
    }
}
