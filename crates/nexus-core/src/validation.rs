//! # Validation Module
//!
//! Input validation for cart submissions, run before any business logic
//! or database write.
//!
//! ## Usage
//! ```rust
//! use nexus_core::types::LineItem;
//! use nexus_core::validation::validate_cart;
//!
//! let cart = vec![LineItem::new("itm-1", "Screen", 1, 4999)];
//! validate_cart(&cart).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::LineItem;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Cart Validators
// =============================================================================

/// Validates a submitted cart.
///
/// ## Rules
/// - At least one line item
/// - Every quantity positive and within the per-line cap
/// - Every unit price non-negative (zero allowed: free items)
/// - Every item id non-empty
///
/// First failing line wins; the error names the offending field.
pub fn validate_cart(items: &[LineItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    for item in items {
        validate_item_id(&item.item_id)?;
        validate_quantity(item.quantity)?;
        validate_price_cents(item.unit_price_cents)?;
    }

    Ok(())
}

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items, goodwill replacements)
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: "unit_price".to_string(),
        });
    }

    Ok(())
}

/// Validates an item id reference.
pub fn validate_item_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "item_id".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use nexus_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_cart_rejects_empty() {
        assert!(matches!(
            validate_cart(&[]),
            Err(ValidationError::EmptyCart)
        ));
    }

    #[test]
    fn test_validate_cart_rejects_bad_line() {
        let bad_qty = vec![LineItem::new("itm-1", "Screen", 0, 4999)];
        assert!(validate_cart(&bad_qty).is_err());

        let bad_price = vec![LineItem::new("itm-1", "Screen", 1, -1)];
        assert!(validate_cart(&bad_price).is_err());

        let bad_id = vec![LineItem::new("", "Screen", 1, 4999)];
        assert!(validate_cart(&bad_id).is_err());
    }

    #[test]
    fn test_validate_cart_accepts_valid() {
        let cart = vec![
            LineItem::new("itm-1", "Screen", 2, 4999),
            LineItem::new("itm-2", "Freebie", 1, 0),
        ];
        assert!(validate_cart(&cart).is_ok());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
