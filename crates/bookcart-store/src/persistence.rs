//! # Cart Persistence
//!
//! Reads and writes the cart JSON under one storage key.
//!
//! ## Recovery Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Durable value              load() returns          Logged as           │
//! │  ─────────────              ──────────────          ─────────           │
//! │  absent                     empty cart              debug               │
//! │  valid cart JSON            the stored cart         info                │
//! │  malformed / wrong shape    empty cart              warn                │
//! │  unreadable medium          empty cart              warn                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! A broken durable copy never fails start-up. It is overwritten by the
//! next successful dispatch.

use std::sync::Arc;

use bookcart_core::CartState;
use tracing::{debug, info, warn};

use crate::error::StoreResult;
use crate::storage::{validate_key, StorageArea};

/// The bridge between a [`CartState`] and one key of a [`StorageArea`].
#[derive(Debug, Clone)]
pub struct CartPersistence {
    storage: Arc<dyn StorageArea>,
    key: String,
}

impl CartPersistence {
    /// Binds `key` in `storage`.
    pub fn new(storage: Arc<dyn StorageArea>, key: impl Into<String>) -> StoreResult<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(CartPersistence { storage, key })
    }

    /// The storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying storage.
    pub fn storage(&self) -> &Arc<dyn StorageArea> {
        &self.storage
    }

    /// Parses a durable cart value.
    pub fn decode(raw: &str) -> StoreResult<CartState> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads the stored cart, surfacing every failure.
    ///
    /// `Ok(None)` means nothing is stored under the key.
    pub fn read(&self) -> StoreResult<Option<CartState>> {
        match self.storage.get_item(&self.key)? {
            Some(raw) => Self::decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Reads the stored cart, falling back to the empty cart on any failure.
    pub fn load(&self) -> CartState {
        match self.read() {
            Ok(Some(state)) => {
                info!(
                    key = %self.key,
                    lines = state.line_count(),
                    total = %state.total,
                    "Loaded cart from storage"
                );
                state
            }
            Ok(None) => {
                debug!(key = %self.key, "No stored cart, starting empty");
                CartState::empty()
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Stored cart unusable, starting empty");
                CartState::empty()
            }
        }
    }

    /// Writes `state` under the key.
    pub fn save(&self, state: &CartState) -> StoreResult<()> {
        let raw = serde_json::to_string(state)?;
        self.storage.set_item(&self.key, &raw)
    }

    /// Removes the key.
    pub fn clear(&self) -> StoreResult<()> {
        self.storage.remove_item(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::StorageOrigin;
    use bookcart_core::{CartItem, Money, ServiceOffer};

    fn persistence(origin: &StorageOrigin) -> CartPersistence {
        CartPersistence::new(Arc::new(origin.open_context()), "shopping-cart").unwrap()
    }

    fn one_line_cart() -> CartState {
        let offer = ServiceOffer::new("window-washing", "Window Washing", Money::from_major(30));
        let item = CartItem::for_service(&offer, 2).unwrap();
        CartState {
            total: item.price,
            items: vec![item],
        }
    }

    #[test]
    fn test_load_absent_is_empty() {
        let origin = StorageOrigin::new();
        let p = persistence(&origin);

        assert_eq!(p.read().unwrap(), None);
        assert_eq!(p.load(), CartState::empty());
    }

    #[test]
    fn test_save_then_load() {
        let origin = StorageOrigin::new();
        let p = persistence(&origin);
        let cart = one_line_cart();

        p.save(&cart).unwrap();

        // A fresh context sees the same cart, as after a page reload
        let reloaded = persistence(&origin);
        assert_eq!(reloaded.load(), cart);
    }

    #[test]
    fn test_corrupt_value_loads_empty() {
        let origin = StorageOrigin::new();
        let p = persistence(&origin);
        p.storage().set_item("shopping-cart", "{not json").unwrap();

        assert!(matches!(p.read(), Err(StoreError::Serialization(_))));
        assert_eq!(p.load(), CartState::empty());
    }

    #[test]
    fn test_wrong_shape_loads_empty() {
        let origin = StorageOrigin::new();
        let p = persistence(&origin);
        p.storage()
            .set_item("shopping-cart", r#"{"items":"nope","total":0}"#)
            .unwrap();

        assert_eq!(p.load(), CartState::empty());
    }

    #[test]
    fn test_clear_removes_key() {
        let origin = StorageOrigin::new();
        let p = persistence(&origin);
        p.save(&one_line_cart()).unwrap();

        p.clear().unwrap();

        assert_eq!(p.storage().get_item("shopping-cart").unwrap(), None);
        assert!(origin.is_empty());
    }

    #[test]
    fn test_decode_accepts_fractional_prices() {
        let state = CartPersistence::decode(
            r#"{"items":[{"id":"a-1","name":"A","description":"1 hour(s) of A",
                "basePrice":12.5,"hours":1,"price":12.5,"quantity":2}],"total":25}"#,
        )
        .unwrap();

        assert_eq!(state.items[0].price, Money::from_cents(1250));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_rejects_invalid_key() {
        let origin = StorageOrigin::new();
        let err = CartPersistence::new(Arc::new(origin.open_context()), "").unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
