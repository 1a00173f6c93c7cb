//! # Cart Runtime
//!
//! Wires a [`CartStore`] to its background tasks from a [`CartConfig`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  backend   sync.enabled   tasks started                                 │
//! │  ───────   ────────────   ─────────────                                 │
//! │  memory    any            none: the origin is private to this runtime   │
//! │  file      true           file watcher (poll) + sync listener           │
//! │  file      false          none: the cart persists but never re-syncs    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A memory-backed runtime owns a fresh [`crate::StorageOrigin`] that no
//! other context can open, so there is nothing to follow. Share an origin
//! across contexts with [`CartStore::open`] and drive them with
//! [`CartStore::sync_pending`] or [`CartStore::spawn_sync_listener`].

use std::sync::Arc;

use tracing::info;

use crate::config::{CartConfig, StorageBackend};
use crate::error::StoreResult;
use crate::storage::{FileStorage, FileWatcher};
use crate::store::{CartStore, SyncListener};

/// A store plus the tasks that keep it in sync. Dropping it stops them.
#[derive(Debug)]
pub struct CartRuntime {
    store: CartStore,
    watcher: Option<FileWatcher>,
    listener: Option<SyncListener>,
}

impl CartRuntime {
    /// Opens the configured store and starts its sync tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: &CartConfig) -> StoreResult<Self> {
        config.validate()?;

        let (store, watcher) = match config.storage.backend {
            StorageBackend::File => {
                let dir = config.resolved_data_dir()?;
                let storage = Arc::new(FileStorage::with_event_capacity(
                    dir,
                    config.sync.event_capacity,
                )?);
                let watcher = config
                    .sync
                    .enabled
                    .then(|| storage.spawn_watcher(config.sync.watch_interval()));
                (CartStore::open(storage, config.key())?, watcher)
            }
            StorageBackend::Memory => (CartStore::from_config(config)?, None),
        };

        // Only a watched file origin can produce foreign writes
        let listener = watcher.is_some().then(|| store.spawn_sync_listener());

        info!(
            key = %store.key(),
            backend = %config.storage.backend,
            sync = listener.is_some(),
            context = %store.context_id(),
            "Cart runtime started"
        );

        Ok(CartRuntime {
            store,
            watcher,
            listener,
        })
    }

    /// The running store.
    pub fn store(&self) -> &CartStore {
        &self.store
    }

    /// Returns true if the cart follows other contexts.
    pub fn is_syncing(&self) -> bool {
        self.listener
            .as_ref()
            .map(SyncListener::is_running)
            .unwrap_or(false)
    }

    /// Stops the background tasks. The store stays usable.
    pub fn shutdown(self) -> CartStore {
        if let Some(watcher) = &self.watcher {
            watcher.stop();
        }
        if let Some(listener) = &self.listener {
            listener.stop();
        }
        info!(key = %self.store.key(), "Cart runtime stopped");
        self.store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookcart_core::{Money, ServiceOffer};
    use std::path::Path;
    use std::time::Duration;

    fn file_config(dir: &Path) -> CartConfig {
        let mut config = CartConfig::default();
        config.storage.backend = StorageBackend::File;
        config.storage.data_dir = Some(dir.to_path_buf());
        config.sync.watch_interval_ms = 10;
        config
    }

    #[tokio::test]
    async fn test_two_processes_share_a_cart() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path());

        let first = CartRuntime::start(&config).unwrap();
        let second = CartRuntime::start(&config).unwrap();
        assert!(first.is_syncing());

        let mut rx = second.store().subscribe();
        let offer = ServiceOffer::new("pool-care", "Pool Care", Money::from_major(45));
        let expected = first
            .store()
            .dispatcher()
            .add_service(&offer, 2)
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("second process never saw the booking")
            .unwrap();
        assert_eq!(*rx.borrow(), expected);

        first.shutdown();
        second.shutdown();
    }

    #[tokio::test]
    async fn test_sync_disabled_starts_no_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = file_config(dir.path());
        config.sync.enabled = false;

        let runtime = CartRuntime::start(&config).unwrap();
        assert!(!runtime.is_syncing());

        let offer = ServiceOffer::new("pool-care", "Pool Care", Money::from_major(45));
        runtime.store().dispatcher().add_service(&offer, 1).unwrap();

        // Still persisted for the next start
        let restarted = CartRuntime::start(&config).unwrap();
        assert_eq!(restarted.store().state(), runtime.store().state());
    }

    #[tokio::test]
    async fn test_memory_runtime_starts_no_tasks() {
        let config = CartConfig::default();
        assert!(config.sync.enabled);

        let runtime = CartRuntime::start(&config).unwrap();
        assert!(!runtime.is_syncing());

        let offer = ServiceOffer::new("pool-care", "Pool Care", Money::from_major(45));
        let expected = runtime.store().dispatcher().add_service(&offer, 1).unwrap();

        let store = runtime.shutdown();
        assert_eq!(store.state(), expected);
    }
}
