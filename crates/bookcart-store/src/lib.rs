//! # bookcart-store: Persistence & Cross-Context Sync for the Cart
//!
//! Everything effectful around the pure reducer in `bookcart-core`: the
//! live cart of one execution context, its durable copy, and the channel
//! that keeps several contexts (tabs, processes) on the same cart.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Sync Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │   CartProvider / use_cart_state()   (page-level access)          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ Dispatcher                              │
//! │  ┌────────────────────────────▼─────────────────────────────────────┐  │
//! │  │   CartStore                                                      │  │
//! │  │   dispatch → reduce → persist → notify observers                 │  │
//! │  └──────────┬───────────────────────────────────────▲───────────────┘  │
//! │             │ save / clear                          │ SYNC_CART         │
//! │  ┌──────────▼──────────────┐          ┌─────────────┴───────────────┐  │
//! │  │   CartPersistence       │          │  sync_pending() or          │  │
//! │  │   one key, JSON         │          │  SyncListener (Tokio task)  │  │
//! │  └──────────┬──────────────┘          └─────────────▲───────────────┘  │
//! │             │                                       │ StorageEvent      │
//! │  ┌──────────▼───────────────────────────────────────┴───────────────┐  │
//! │  │   StorageArea: MemoryStorage (StorageOrigin) | FileStorage        │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  CartRuntime: builds all of the above from CartConfig and owns the     │
//! │  background tasks (sync listener, file watcher).                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`store`] - `CartStore`, the per-context cart
//! - [`persistence`] - Reading and writing the durable cart
//! - [`storage`] - Storage backends and cross-context notifications
//! - [`provider`] - Thread-scoped provider and `use_cart_state`
//! - [`runtime`] - Config-driven wiring of store and background tasks
//! - [`config`] - Cart configuration (storage key, backend, sync)
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use bookcart_core::{CartAction, Money, ServiceOffer, CartItem};
//! use bookcart_store::{CartStore, CART_STORAGE_KEY};
//! use bookcart_store::storage::StorageOrigin;
//!
//! let origin = StorageOrigin::new();
//! let tab_a = CartStore::open(Arc::new(origin.open_context()), CART_STORAGE_KEY).unwrap();
//! let tab_b = CartStore::open(Arc::new(origin.open_context()), CART_STORAGE_KEY).unwrap();
//!
//! let offer = ServiceOffer::new("car-detailing", "Car Detailing", Money::from_major(60));
//! tab_a.dispatch(CartAction::AddToCart(CartItem::for_service(&offer, 3).unwrap()));
//!
//! tab_b.sync_pending();
//! assert_eq!(tab_b.state(), tab_a.state());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod persistence;
pub mod provider;
pub mod runtime;
pub mod storage;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CartConfig, StorageBackend, StorageSettings, SyncSettings};
pub use error::{StoreError, StoreResult};
pub use persistence::CartPersistence;
pub use provider::{clear_cart, use_cart_state, CartContext, CartProvider, Dispatcher, ProviderGuard};
pub use runtime::CartRuntime;
pub use storage::{
    ContextId, FileStorage, MemoryStorage, StorageArea, StorageEvent, StorageOrigin, StorageSignal,
};
pub use store::{CartStore, SyncListener};

/// Storage key the cart lives under unless configured otherwise.
pub const CART_STORAGE_KEY: &str = "shopping-cart";
