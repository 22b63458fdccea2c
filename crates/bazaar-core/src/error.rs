//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (denomination names, amounts)
//! 3. Errors are enum variants, never String
//! 4. Monetary amounts in errors are always in base units

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent currency or wallet rule violations. They are
/// local failures: nothing here is retried, the caller reports them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A coin bag carried a count that is not a non-negative integer.
    ///
    /// Bags come from untrusted peers and loosely-typed documents, so
    /// every count is validated before any arithmetic.
    #[error("Invalid coin count for {denomination}: {count}")]
    InvalidCoinCount { denomination: String, count: i64 },

    /// A coin bag referenced a denomination that is not configured.
    #[error("Unknown denomination: {name}")]
    UnknownDenomination { name: String },

    /// A wallet subtraction was attempted beyond the available balance.
    ///
    /// The wallet is left unmodified when this is returned.
    #[error("Insufficient funds: requested {requested}, available {available} (short {shortfall})")]
    InsufficientFunds {
        requested: i64,
        available: i64,
        shortfall: i64,
    },

    /// An amount cannot be expressed as whole coins of the smallest
    /// denomination (non-optimized add only).
    #[error("Amount {amount} is not a multiple of the smallest denomination unit {smallest}")]
    AmountNotRepresentable { amount: i64, smallest: i64 },

    /// A negative amount was passed where only non-negative amounts are
    /// meaningful.
    #[error("Amount must be non-negative, got {amount}")]
    NegativeAmount { amount: i64 },

    /// The configured denomination list failed validation.
    #[error("Invalid denomination set: {reason}")]
    InvalidDenominations { reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
