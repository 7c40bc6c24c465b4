//! # Error Types
//!
//! Domain-specific error types for tillbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! tillbook-core errors (this file)
//! ├── CoreError        - Business rule / invariant violations
//! └── ValidationError  - Input validation failures
//!
//! tillbook-db errors (separate crate)
//! └── DbError          - Database operation failures (wraps CoreError)
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations and domain logic failures.
///
/// A `CoreError` always means the request was rejected before any partial
/// mutation was applied.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stock decrement would drive `current_stock` negative and the
    /// product does not allow negative stock.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// A state transition was attempted from a status that does not allow it
    /// (e.g. completing an already completed sale, receiving a cancelled
    /// purchase).
    #[error("{entity} {id} is '{status}', cannot {operation}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        status: String,
        operation: &'static str,
    },

    /// Payment amount must be strictly positive.
    #[error("Invalid payment amount: {cents} cents")]
    InvalidPaymentAmount { cents: i64 },

    /// A credit charge would breach the customer's credit policy, either
    /// because the account is not active or the limit would be exceeded.
    #[error("Credit not allowed for {customer}: charge {requested} with balance {balance} of limit {limit}")]
    CreditNotAllowed {
        customer: String,
        requested: i64,
        balance: i64,
        limit: i64,
    },

    /// A movement record carried inconsistent before/after/change values.
    #[error("Inconsistent stock movement: {before} + {change} != {after}")]
    InconsistentMovement { before: i64, change: i64, after: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller-supplied fields don't meet structural
/// requirements. Reported per field, before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. invalid UUID, bad characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "COKE-330".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for COKE-330: available 3, requested 5"
        );

        let err = CoreError::InvalidTransition {
            entity: "Sale",
            id: "abc".to_string(),
            status: "completed".to_string(),
            operation: "complete",
        };
        assert_eq!(err.to_string(), "Sale abc is 'completed', cannot complete");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
