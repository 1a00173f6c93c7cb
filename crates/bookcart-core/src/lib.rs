//! # bookcart-core: Pure Cart Logic for the Booking Storefront
//!
//! This crate is the state machine behind the storefront's shopping cart.
//! It contains the cart types and the reducer as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bookcart Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Storefront pages (out of scope)                   │   │
//! │  │    Category page ──► Cart page ──► Checkout ──► Navbar badge    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ use_cart_state() / dispatch            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 bookcart-store (I/O layer)                      │   │
//! │  │   CartStore ── persistence ── storage notifications             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ reduce(&state, action)                 │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bookcart-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │   money   │  │  reducer  │  │ validation│   │   │
//! │  │   │ CartItem  │  │   Money   │  │  reduce() │  │   rules   │   │   │
//! │  │   │ CartState │  │           │  │           │  │           │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO LOGGING • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Cart types (`CartItem`, `CartState`, `CartAction`, `ServiceOffer`)
//! - [`money`] - Money type with integer arithmetic
//! - [`reducer`] - The pure state transition function
//! - [`error`] - Domain error types
//! - [`validation`] - Line item construction rules
//!
//! ## Example Usage
//!
//! ```rust
//! use bookcart_core::{reduce, CartAction, CartState, Money, ServiceOffer, CartItem};
//!
//! let offer = ServiceOffer::new("basic-cleaning", "Basic Cleaning", Money::from_major(25));
//! let item = CartItem::for_service(&offer, 2).unwrap();
//!
//! let state = reduce(&CartState::empty(), CartAction::AddToCart(item));
//! assert_eq!(state.total, Money::from_major(50));
//! assert_eq!(state.items[0].id, "basic-cleaning-2");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod reducer;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use reducer::reduce;
pub use types::*;
