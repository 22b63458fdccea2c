//! # Broker Error Types
//!
//! Error types for coordination and messaging.
//!
//! Most coordinator failures are not errors at this level: stock and
//! funds rejections are regular [`TransactionOutcome`]s delivered over
//! the bus. `BrokerError` covers the machinery itself.
//!
//! [`TransactionOutcome`]: bazaar_core::TransactionOutcome

use bazaar_core::CoreError;
use bazaar_ledger::LedgerError;
use thiserror::Error;

/// Coordination and messaging errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// A channel endpoint was closed or the bus rejected a message.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// The approval gate declined the request.
    #[error("Request declined by approval gate")]
    ApprovalDeclined,

    /// A per-line apply step failed after validation passed.
    #[error("Apply failed: {0}")]
    ApplyFailed(String),

    /// A ledger operation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A currency or wallet rule was violated.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
