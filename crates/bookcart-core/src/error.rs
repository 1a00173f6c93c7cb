//! # Error Types
//!
//! Domain-specific error types for bookcart-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bookcart-core errors (this file)                                      │
//! │  ├── CoreError        - Line item construction failures                │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bookcart-store errors (separate crate)                                │
//! │  └── StoreError       - Storage, config and provider failures          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError → page layer           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reducer itself never fails. These errors only come from building
//! line items at the page boundary, before anything is dispatched.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core cart logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// `basePrice * hours` does not fit in the money representation.
    #[error("Price overflow for {service_id}: {hours} hour(s) at the given base price")]
    PriceOverflow { service_id: String, hours: u32 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
