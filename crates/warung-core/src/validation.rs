//! # Validation Module
//!
//! Boundary validation for the commit pipeline. Runs before any business
//! logic; the database constraints behind it are the last line of defense.

use crate::error::ValidationError;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a cash amount in rupiah.
///
/// ## Rules
/// - Must be positive (> 0); zero-amount ledger entries are meaningless
pub fn validate_amount(amount: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates an actor/cashier reference.
pub fn validate_actor(actor: &str) -> ValidationResult<()> {
    if actor.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "actor".to_string(),
        });
    }

    Ok(())
}

/// Validates a ledger entry description.
///
/// ## Rules
/// - Must not be empty (the audit trail must say what happened)
/// - Maximum 500 characters
pub fn validate_description(description: &str) -> ValidationResult<()> {
    let description = description.trim();

    if description.is_empty() {
        return Err(ValidationError::Required {
            field: "description".to_string(),
        });
    }

    if description.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 500,
        });
    }

    Ok(())
}

/// Validates a UUID string format.
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
    fn test_validate_amount() {
        assert!(validate_amount(22_000).is_ok());
        assert!(validate_amount(0).is_err());
        assert!(validate_amount(-500).is_err());
    }

    #[test]
    fn test_validate_actor() {
        assert!(validate_actor("kasir-1").is_ok());
        assert!(validate_actor("").is_err());
        assert!(validate_actor("   ").is_err());
    }

    #[test]
    fn test_validate_description() {
        assert!(validate_description("setoran pagi").is_ok());
        assert!(validate_description("").is_err());
        assert!(validate_description(&"a".repeat(600)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
