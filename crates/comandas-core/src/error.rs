//! # Error Types
//!
//! Domain-specific error types for comandas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  comandas-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  comandas-db errors                                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  comandas-pinpad errors                                                │
//! │  └── ProviderError    - Payment provider failures                      │
//! │                                                                         │
//! │  apps/api errors                                                       │
//! │  └── ApiError         - What HTTP clients see ({code, message})        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. The API layer maps
/// them to 4xx responses.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced product doesn't exist or was soft-deleted.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Order is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Finalizing a checkout for an order that is already entregue
    /// - Finalizing a checkout for a cancelled order
    #[error("Order {code} is {current}, cannot perform operation")]
    InvalidOrderStatus { code: String, current: String },

    /// Checkout is not in the state the transition requires.
    #[error("Checkout {id} is {current}, expected {expected}")]
    InvalidCheckoutStatus {
        id: String,
        current: String,
        expected: String,
    },

    /// The order already has a checkout (one checkout per order).
    #[error("Order {code} already has a checkout")]
    CheckoutExists { code: String },

    /// Another open order already uses this name.
    ///
    /// ## User Workflow
    /// ```text
    /// Table 12 has an order "preparando"
    ///      │
    ///      ▼
    /// Waiter creates a new order named "12"
    ///      │
    ///      ▼
    /// DuplicateOpenOrder { name: "12", code: "4821" }
    /// ```
    #[error("Order name '{name}' is already in use by open order {code}")]
    DuplicateOpenOrder { name: String, code: String },

    /// Product is part of one or more active combos and can't be removed.
    #[error("Product '{product}' is used by active combos: {}", combos.join(", "))]
    ProductInActiveCombos { product: String, combos: Vec<String> },

    /// The default pinpad can't be deleted.
    #[error("Pinpad '{0}' is the default and cannot be deleted")]
    DefaultPinpadLocked(String),

    /// Only active pinpads may become the default.
    #[error("Pinpad '{0}' is inactive")]
    InactivePinpad(String),

    /// Payment amount exceeds the terminal's configured limit.
    #[error("Amount {amount} exceeds pinpad limit {max}")]
    AmountExceedsLimit { amount: String, max: String },

    /// Users can't delete their own account.
    #[error("You cannot delete your own account")]
    SelfDeletion,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    /// Invalid format (e.g., non-digit order name, bad date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value inside a single request (e.g., same product twice in a combo).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },

    /// Two fields that must match don't.
    #[error("{field} does not match")]
    Mismatch { field: String },

    /// Cross-field rule failure.
    #[error("{0}")]
    Rule(String),
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
