//! # Cart Reducer
//!
//! The pure state transition function `(state, action) -> state`.
//!
//! ## Action Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Action            Effect on items               Effect on total        │
//! │  ──────            ───────────────               ───────────────        │
//! │                                                                         │
//! │  ADD_TO_CART       new id  → append              + incoming price      │
//! │                    known id → quantity + 1       + incoming price      │
//! │                                                                         │
//! │  REMOVE_FROM_CART  drop matching line            − price × quantity    │
//! │                    (absent → unchanged)          (absent → unchanged)  │
//! │                                                                         │
//! │  UPDATE_QUANTITY   qty > 0  → set quantity       recomputed from lines │
//! │                    qty <= 0 → same as REMOVE                           │
//! │                                                                         │
//! │  SYNC_CART         replaced verbatim             replaced verbatim     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persistence is not done here. The store writes the returned state to
//! durable storage right after calling [`reduce`].

use crate::types::{CartAction, CartItem, CartState};

/// Applies `action` to `state` and returns the next state.
///
/// ## Merge Path
/// Adding an id that is already in the cart increments that line's
/// quantity by one and adds the *incoming* item's price to the total. The
/// existing line's fields are kept as they are. Line ids encode the hours,
/// so in practice both prices are the same.
///
/// ## Quantity Floor
/// `UPDATE_QUANTITY` with a quantity of zero or less removes the line, so
/// no reachable state holds a non-positive quantity.
///
/// ```rust
/// use bookcart_core::{reduce, CartAction, CartState, Money, ServiceOffer, CartItem};
///
/// let offer = ServiceOffer::new("x", "X", Money::from_major(25));
/// let item = CartItem::for_service(&offer, 2).unwrap();
///
/// let state = reduce(&CartState::empty(), CartAction::AddToCart(item));
/// let state = reduce(&state, CartAction::UpdateQuantity { id: "x-2".into(), quantity: 0 });
/// assert!(state.is_empty());
/// assert!(state.total.is_zero());
/// ```
pub fn reduce(state: &CartState, action: CartAction) -> CartState {
    match action {
        CartAction::AddToCart(item) => add_to_cart(state, item),
        CartAction::RemoveFromCart(id) => remove_from_cart(state, &id),
        CartAction::UpdateQuantity { id, quantity } if quantity <= 0 => {
            remove_from_cart(state, &id)
        }
        CartAction::UpdateQuantity { id, quantity } => update_quantity(state, &id, quantity),
        CartAction::SyncCart(next) => next,
    }
}

fn add_to_cart(state: &CartState, item: CartItem) -> CartState {
    let total = state.total + item.price;

    if state.find(&item.id).is_some() {
        let items = state
            .items
            .iter()
            .map(|existing| {
                if existing.id == item.id {
                    CartItem {
                        quantity: existing.quantity.saturating_add(1),
                        ..existing.clone()
                    }
                } else {
                    existing.clone()
                }
            })
            .collect();
        return CartState { items, total };
    }

    let mut items = state.items.clone();
    items.push(item);
    CartState { items, total }
}

fn remove_from_cart(state: &CartState, id: &str) -> CartState {
    let Some(removed) = state.find(id) else {
        return state.clone();
    };

    CartState {
        total: state.total - removed.line_total(),
        items: state
            .items
            .iter()
            .filter(|item| item.id != id)
            .cloned()
            .collect(),
    }
}

fn update_quantity(state: &CartState, id: &str, quantity: i64) -> CartState {
    let items: Vec<CartItem> = state
        .items
        .iter()
        .map(|item| {
            if item.id == id {
                CartItem {
                    quantity,
                    ..item.clone()
                }
            } else {
                item.clone()
            }
        })
        .collect();

    // Recomputed rather than adjusted, so an absent id still heals the total.
    let total = items.iter().map(CartItem::line_total).sum();
    CartState { items, total }
}

// =============================================================================
// Unit Tests
// =============================================================================
