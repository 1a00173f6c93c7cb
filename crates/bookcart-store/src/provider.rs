//! # Cart Provider
//!
//! Makes one [`CartStore`] the ambient cart for code running on the current
//! thread, so page-level code can ask for "the cart" without threading a
//! handle through every call.
//!
//! ## Scoping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  thread-local provider stack                                            │
//! │                                                                         │
//! │  outer.provide() ───────────────────────────────────────────┐           │
//! │     use_cart_state() → outer                                 │           │
//! │     inner.provide() ─────────────────┐                       │           │
//! │        use_cart_state() → inner      │ innermost wins        │           │
//! │     (guard dropped) ─────────────────┘                       │           │
//! │     use_cart_state() → outer                                 │           │
//! │  (guard dropped) ────────────────────────────────────────────┘           │
//! │  use_cart_state() → Err(OutsideProvider)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Guards are `!Send`: a provider is bound to the thread that installed it.
//!
//! ```rust
//! use std::sync::Arc;
//! use bookcart_core::{Money, ServiceOffer};
//! use bookcart_store::{use_cart_state, CartProvider, CartStore};
//! use bookcart_store::storage::StorageOrigin;
//!
//! let origin = StorageOrigin::new();
//! let store = CartStore::open(Arc::new(origin.open_context()), "shopping-cart").unwrap();
//! let provider = CartProvider::new(store);
//!
//! provider.scope(|| {
//!     let cart = use_cart_state().unwrap();
//!     let offer = ServiceOffer::new("gardening", "Gardening", Money::from_major(40));
//!     cart.dispatch.add_service(&offer, 2).unwrap();
//!
//!     assert_eq!(use_cart_state().unwrap().state.item_count(), 1);
//! });
//!
//! assert!(use_cart_state().is_err());
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;

use bookcart_core::{CartAction, CartItem, CartState, ServiceOffer};

use crate::error::{StoreError, StoreResult};
use crate::store::CartStore;

thread_local! {
    static PROVIDERS: RefCell<Vec<CartStore>> = const { RefCell::new(Vec::new()) };
}

// =============================================================================
// Provider
// =============================================================================

/// Installs a [`CartStore`] as the current thread's cart.
#[derive(Debug, Clone)]
pub struct CartProvider {
    store: CartStore,
}

impl CartProvider {
    /// Wraps `store`.
    pub fn new(store: CartStore) -> Self {
        CartProvider { store }
    }

    /// The provided store.
    pub fn store(&self) -> &CartStore {
        &self.store
    }

    /// Makes this store the current cart until the guard is dropped.
    pub fn provide(&self) -> ProviderGuard {
        let depth = PROVIDERS.with(|providers| {
            let mut providers = providers.borrow_mut();
            providers.push(self.store.clone());
            providers.len() - 1
        });
        ProviderGuard {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Runs `f` with this store as the current cart.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.provide();
        f()
    }
}

/// Keeps a provider installed. Dropping it uninstalls the provider and any
/// nested ones still above it.
#[derive(Debug)]
pub struct ProviderGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ProviderGuard {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread exit
        let _ = PROVIDERS.try_with(|providers| providers.borrow_mut().truncate(self.depth));
    }
}

// =============================================================================
// Consumer Access
// =============================================================================

/// What a consumer gets from [`use_cart_state`].
#[derive(Debug, Clone)]
pub struct CartContext {
    /// Cart snapshot at the time of the call.
    pub state: CartState,

    /// Sends actions to the provided store.
    pub dispatch: Dispatcher,
}

/// Returns the innermost provided cart.
///
/// # Errors
/// [`StoreError::OutsideProvider`] if no provider is installed on this
/// thread. That is a wiring bug in the caller.
pub fn use_cart_state() -> StoreResult<CartContext> {
    let store = PROVIDERS
        .with(|providers| providers.borrow().last().cloned())
        .ok_or(StoreError::OutsideProvider)?;

    Ok(CartContext {
        state: store.state(),
        dispatch: store.dispatcher(),
    })
}

/// Empties the cart everywhere: removes the stored copy and resets every
/// context to the empty cart.
pub fn clear_cart(dispatch: &Dispatcher) -> CartState {
    dispatch.store.clear_cart()
}

// =============================================================================
// Dispatcher
// =============================================================================

/// The dispatch half of a [`CartContext`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: CartStore,
}

impl Dispatcher {
    pub(crate) fn new(store: CartStore) -> Self {
        Dispatcher { store }
    }

    /// Sends a raw action.
    pub fn send(&self, action: CartAction) -> CartState {
        self.store.dispatch(action)
    }

    /// Books `offer` for `hours` hours.
    ///
    /// Zero hours or an invalid offer is rejected and nothing is dispatched.
    pub fn add_service(&self, offer: &ServiceOffer, hours: u32) -> StoreResult<CartState> {
        let item = CartItem::for_service(offer, hours)?;
        Ok(self.send(CartAction::AddToCart(item)))
    }

    /// Sets a line's quantity. Below one removes the line.
    pub fn set_quantity(&self, id: impl Into<String>, quantity: i64) -> CartState {
        self.send(CartAction::UpdateQuantity {
            id: id.into(),
            quantity,
        })
    }

    /// Removes a line.
    pub fn remove(&self, id: impl Into<String>) -> CartState {
        self.send(CartAction::RemoveFromCart(id.into()))
    }

    /// The store actions are sent to.
    pub fn store(&self) -> &CartStore {
        &self.store
    }
}
