//! # Ledger Error Types
//!
//! Error types for settings, document, and store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error) / serde_json::Error                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerError (this module) ← Adds context and categorization           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BrokerError (coordinator) ← Wrapped via #[from]                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Failure outcome delivered to the requesting peer                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_core::CoreError;
use thiserror::Error;

/// Ledger operation errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A settings read or write failed.
    #[error("Settings operation failed for key '{key}': {message}")]
    SettingsError { key: String, message: String },

    /// The backing database rejected an operation.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored value could not be (de)serialized.
    ///
    /// Settings values come from JSON documents edited by the host, so
    /// a malformed value is surfaced, never silently replaced.
    #[error("Serialization failed for key '{key}': {source}")]
    SerializationFailed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The operation is not meaningful for the current balance source.
    ///
    /// Derived balances can only be decreased through coin spending;
    /// there is no item to credit an arbitrary increase to.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// No vendor with the given id exists.
    #[error("Vendor not found: {vendor_id}")]
    VendorNotFound { vendor_id: String },

    /// No item with the given id exists on the vendor or inventory.
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    /// No inventory document exists for the actor.
    #[error("Actor not found: {actor_id}")]
    ActorNotFound { actor_id: String },

    /// A currency or wallet rule was violated.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::DatabaseError(err.to_string())
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
