//! # Cart Types
//!
//! The data model of the cart: line items, the aggregate state, the
//! actions the reducer accepts, and the catalog slice needed to build a
//! line item.
//!
//! ## Durable Shape
//! `CartState` serializes to exactly the JSON kept under the storage key:
//! ```json
//! {
//!   "items": [
//!     {
//!       "id": "basic-cleaning-2",
//!       "name": "Basic Cleaning",
//!       "description": "2 hour(s) of Basic Cleaning",
//!       "basePrice": 25,
//!       "hours": 2,
//!       "price": 50,
//!       "quantity": 1
//!     }
//!   ],
//!   "total": 50
//! }
//! ```
//! There is no version field. A schema change needs a migration on load or
//! a new storage key.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::validation;

// =============================================================================
// Service Offer
// =============================================================================

/// The part of a catalog entry needed to put a booking in the cart.
///
/// The catalog itself (categories, images, estimated hours) lives with the
/// pages; the cart only needs identity, display title and hourly price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOffer {
    /// Catalog identifier, e.g. `basic-cleaning`.
    pub id: String,

    /// Display title, e.g. `Basic Cleaning`.
    pub title: String,

    /// Price per billable hour.
    pub base_price: Money,
}

impl ServiceOffer {
    /// Creates a new offer.
    pub fn new(id: impl Into<String>, title: impl Into<String>, base_price: Money) -> Self {
        ServiceOffer {
            id: id.into(),
            title: title.into(),
            base_price,
        }
    }
}

// =============================================================================
// Cart Item
// =============================================================================

/// One purchasable line in the cart.
///
/// ## Design Notes
/// - `id` is `"{service_id}-{hours}"`: the same service booked for a
///   different duration is a different line
/// - `price` is denormalized: `base_price × hours` frozen at the time the
///   item was built. Nothing recomputes it later.
/// - `quantity` counts identical bookings of this exact line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartItem {
    /// Line identifier, unique within a cart.
    pub id: String,

    /// Display name (frozen).
    pub name: String,

    /// Display description (frozen).
    pub description: String,

    /// Price per billable hour.
    #[ts(type = "number")]
    pub base_price: Money,

    /// Billable hours booked.
    pub hours: u32,

    /// Line price for one booking: `base_price × hours` when built.
    #[ts(type = "number")]
    pub price: Money,

    /// Number of identical bookings of this line.
    #[serde(default = "default_quantity")]
    #[ts(type = "number")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

impl CartItem {
    /// Builds the line item for booking `offer` for `hours` hours.
    ///
    /// ## User Workflow
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────────┐
    /// │  Category page                                                          │
    /// │                                                                         │
    /// │  Basic Cleaning  $25/hour   [ 2 hours ▼ ]   [ Add to cart ]            │
    /// │                                   │                                     │
    /// │                                   ▼                                     │
    /// │  for_service(offer, 2) ← THIS FUNCTION                                 │
    /// │       │                                                                 │
    /// │       ├── hours == 0? → Error (nothing is added)                        │
    /// │       │                                                                 │
    /// │       └── CartItem { id: "basic-cleaning-2", price: 50, quantity: 1 }  │
    /// │                                   │                                     │
    /// │                                   ▼                                     │
    /// │                   dispatch(ADD_TO_CART)                                 │
    /// └─────────────────────────────────────────────────────────────────────────┘
    /// ```
    pub fn for_service(offer: &ServiceOffer, hours: u32) -> CoreResult<Self> {
        validation::validate_offer(offer)?;
        validation::validate_hours(hours)?;

        let price = offer
            .base_price
            .checked_mul_quantity(i64::from(hours))
            .ok_or_else(|| CoreError::PriceOverflow {
                service_id: offer.id.clone(),
                hours,
            })?;

        Ok(CartItem {
            id: line_id(&offer.id, hours),
            name: offer.title.clone(),
            description: format!("{} hour(s) of {}", hours, offer.title),
            base_price: offer.base_price,
            hours,
            price,
            quantity: 1,
        })
    }

    /// Calculates the line total (price × quantity).
    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }
}

/// Builds the line identifier for a service booked for `hours` hours.
pub fn line_id(service_id: &str, hours: u32) -> String {
    format!("{}-{}", service_id, hours)
}

// =============================================================================
// Cart State
// =============================================================================

/// The cart aggregate.
///
/// ## Invariants
/// - Items are unique by `id`
/// - `total == Σ(item.price × item.quantity)` after every local action
///
/// `SYNC_CART` installs an externally observed state verbatim, so the total
/// invariant holds only as far as the other context kept it. See
/// [`CartState::is_consistent`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartState {
    /// Lines in insertion order.
    pub items: Vec<CartItem>,

    /// Running total.
    #[ts(type = "number")]
    pub total: Money,
}

impl CartState {
    /// The canonical empty cart: `{items: [], total: 0}`.
    pub fn empty() -> Self {
        CartState::default()
    }

    /// Checks if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Finds a line by id.
    pub fn find(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    /// Total number of bookings across all lines (the navbar badge count).
    pub fn item_count(&self) -> i64 {
        self.items
            .iter()
            .fold(0, |count, item| count.saturating_add(item.quantity))
    }

    /// Recomputes the total from the lines.
    pub fn computed_total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Returns true if the total matches the lines and ids are unique.
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.items.len());
        let unique = self.items.iter().all(|item| seen.insert(item.id.as_str()));
        unique && self.total == self.computed_total()
    }
}

// =============================================================================
// Cart Action
// =============================================================================

/// Everything the reducer accepts.
///
/// ## Serialization
/// Adjacently tagged, so an action reads the same way it would in a web
/// client's dispatch call:
/// ```json
/// { "type": "UPDATE_QUANTITY", "payload": { "id": "car-detailing-3", "quantity": 2 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum CartAction {
    /// Add a fully formed line, or bump the quantity of an existing one.
    AddToCart(CartItem),

    /// Drop the line with this id.
    RemoveFromCart(String),

    /// Set the quantity of a line. Non-positive quantities remove it.
    UpdateQuantity {
        id: String,
        #[ts(type = "number")]
        quantity: i64,
    },

    /// Replace the whole state with one observed in durable storage.
    SyncCart(CartState),
}

impl CartAction {
    /// Wire tag of this action, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            CartAction::AddToCart(_) => "ADD_TO_CART",
            CartAction::RemoveFromCart(_) => "REMOVE_FROM_CART",
            CartAction::UpdateQuantity { .. } => "UPDATE_QUANTITY",
            CartAction::SyncCart(_) => "SYNC_CART",
        }
    }

    /// Line id this action targets, if it targets a single line.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            CartAction::AddToCart(item) => Some(&item.id),
            CartAction::RemoveFromCart(id) => Some(id),
            CartAction::UpdateQuantity { id, .. } => Some(id),
            CartAction::SyncCart(_) => None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaning() -> ServiceOffer {
        ServiceOffer::new("basic-cleaning", "Basic Cleaning", Money::from_major(25))
    }

    #[test]
    fn test_for_service_builds_line() {
        let item = CartItem::for_service(&cleaning(), 3).unwrap();

        assert_eq!(item.id, "basic-cleaning-3");
        assert_eq!(item.name, "Basic Cleaning");
        assert_eq!(item.description, "3 hour(s) of Basic Cleaning");
        assert_eq!(item.base_price, Money::from_major(25));
        assert_eq!(item.hours, 3);
        assert_eq!(item.price, Money::from_major(75));
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn test_for_service_distinct_hours_distinct_lines() {
        let two = CartItem::for_service(&cleaning(), 2).unwrap();
        let four = CartItem::for_service(&cleaning(), 4).unwrap();
        assert_ne!(two.id, four.id);
    }

    #[test]
    fn test_for_service_rejects_zero_hours() {
        assert!(CartItem::for_service(&cleaning(), 0).is_err());
    }

    #[test]
    fn test_for_service_rejects_overflow() {
        let offer = ServiceOffer::new("gold", "Gold", Money::from_cents(i64::MAX / 2));
        let err = CartItem::for_service(&offer, 3).unwrap_err();
        assert!(matches!(err, CoreError::PriceOverflow { hours: 3, .. }));
    }

    #[test]
    fn test_cart_item_json_shape() {
        let item = CartItem::for_service(&cleaning(), 2).unwrap();
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["basePrice"], 25);
        assert_eq!(json["price"], 50);
        assert_eq!(json["hours"], 2);
        assert_eq!(json["quantity"], 1);
    }

    #[test]
    fn test_cart_item_quantity_defaults_to_one() {
        let json = r#"{"id":"x-1","name":"X","description":"1 hour(s) of X",
                       "basePrice":10,"hours":1,"price":10}"#;
        let item: CartItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn test_state_counts_and_totals() {
        let mut a = CartItem::for_service(&cleaning(), 1).unwrap();
        a.quantity = 2;
        let b = CartItem::for_service(&cleaning(), 2).unwrap();

        let state = CartState {
            total: Money::from_major(100),
            items: vec![a, b],
        };

        assert_eq!(state.line_count(), 2);
        assert_eq!(state.item_count(), 3);
        assert_eq!(state.computed_total(), Money::from_major(100));
        assert!(state.is_consistent());
        assert!(state.find("basic-cleaning-2").is_some());
        assert!(state.find("basic-cleaning-9").is_none());
    }

    #[test]
    fn test_state_inconsistency_detected() {
        let a = CartItem::for_service(&cleaning(), 1).unwrap();

        let wrong_total = CartState {
            items: vec![a.clone()],
            total: Money::from_major(99),
        };
        assert!(!wrong_total.is_consistent());

        let duplicate_ids = CartState {
            items: vec![a.clone(), a],
            total: Money::from_major(50),
        };
        assert!(!duplicate_ids.is_consistent());
    }

    #[test]
    fn test_helpers_tolerate_extreme_stored_values() {
        let json = r#"{"items":[
            {"id":"a-1","name":"A","description":"1 hour(s) of A",
             "basePrice":1,"hours":1,"price":1,"quantity":9223372036854775807},
            {"id":"b-1","name":"B","description":"1 hour(s) of B",
             "basePrice":1,"hours":1,"price":1,"quantity":5}
        ],"total":0}"#;
        let state: CartState = serde_json::from_str(json).unwrap();

        assert_eq!(state.item_count(), i64::MAX);
        assert_eq!(state.computed_total(), Money::from_cents(i64::MAX));
        assert!(!state.is_consistent());
    }

    #[test]
    fn test_empty_state_shape() {
        let json = serde_json::to_string(&CartState::empty()).unwrap();
        assert_eq!(json, r#"{"items":[],"total":0}"#);
    }

    #[test]
    fn test_action_wire_format() {
        let action = CartAction::UpdateQuantity {
            id: "x-2".to_string(),
            quantity: 3,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "UPDATE_QUANTITY");
        assert_eq!(json["payload"]["id"], "x-2");
        assert_eq!(json["payload"]["quantity"], 3);

        let parsed: CartAction =
            serde_json::from_str(r#"{"type":"REMOVE_FROM_CART","payload":"x-2"}"#).unwrap();
        assert_eq!(parsed, CartAction::RemoveFromCart("x-2".to_string()));
        assert_eq!(parsed.kind(), "REMOVE_FROM_CART");
        assert_eq!(parsed.target_id(), Some("x-2"));
    }
}
