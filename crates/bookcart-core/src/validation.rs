//! # Validation Module
//!
//! Rules applied when a page turns a catalog selection into a line item.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Page                                                         │
//! │  └── Only offers hour choices from the catalog                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: CartItem::for_service                                        │
//! │  └── THIS MODULE: id/title/price/hours rules                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Reducer                                                      │
//! │  └── Trusts the item; only enforces the quantity floor                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::ServiceOffer;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a catalog service id.
///
/// ## Rules
/// - Must not be empty
/// - Must not contain whitespace (it becomes part of the line id)
///
/// ```rust
/// use bookcart_core::validation::validate_service_id;
///
/// assert!(validate_service_id("deep-cleaning").is_ok());
/// assert!(validate_service_id("").is_err());
/// assert!(validate_service_id("deep cleaning").is_err());
/// ```
pub fn validate_service_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "service id".to_string(),
        });
    }

    if id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "service id".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a display title.
pub fn validate_title(title: &str) -> ValidationResult<()> {
    if title.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "title".to_string(),
        });
    }
    Ok(())
}

/// Validates an hourly base price. Free services are not bookable.
pub fn validate_base_price(price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "base price".to_string(),
        });
    }
    Ok(())
}

/// Validates a number of billable hours.
pub fn validate_hours(hours: u32) -> ValidationResult<()> {
    if hours == 0 {
        return Err(ValidationError::MustBePositive {
            field: "hours".to_string(),
        });
    }
    Ok(())
}

/// Validates every field of an offer.
pub fn validate_offer(offer: &ServiceOffer) -> ValidationResult<()> {
    validate_service_id(&offer.id)?;
    validate_title(&offer.title)?;
    validate_base_price(offer.base_price)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_service_id() {
        assert!(validate_service_id("car-detailing").is_ok());
        assert!(validate_service_id("   ").is_err());
        assert!(validate_service_id("car\tdetailing").is_err());
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Car Detailing").is_ok());
        assert!(validate_title("").is_err());
    }

    #[test]
    fn test_validate_base_price() {
        assert!(validate_base_price(Money::from_major(45)).is_ok());
        assert!(validate_base_price(Money::zero()).is_err());
        assert!(validate_base_price(Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_hours() {
        assert!(validate_hours(1).is_ok());
        assert!(matches!(
            validate_hours(0),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_validate_offer_reports_first_failure() {
        let offer = ServiceOffer::new("", "", Money::zero());
        assert!(matches!(
            validate_offer(&offer),
            Err(ValidationError::Required { ref field }) if field == "service id"
        ));
    }
}
