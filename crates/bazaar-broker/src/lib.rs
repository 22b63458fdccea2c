//! # bazaar-broker: Transaction Coordination for Bazaar
//!
//! The authoritative transaction coordinator, the approval gate, and
//! the message bus peers use to talk to the authority.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Coordination                              │
//! │                                                                         │
//! │   PEER                      AUTHORITY                      PEER         │
//! │    │                            │                            │          │
//! │    │  PlayerPurchaseRequest     │                            │          │
//! │    ├───────────────────────────►│                            │          │
//! │    │                            ▼                            │          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  bazaar-broker (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  bridge   │  │coordinator│  │ approval  │  │   locks   │  │   │
//! │  │   │MessageBus │─►│ 8-step    │─►│  gate     │  │ per-      │  │   │
//! │  │   │ broadcast │  │ flow      │  │ (async)   │  │ resource  │  │   │
//! │  │   └───────────┘  └─────┬─────┘  └───────────┘  └───────────┘  │   │
//! │  └────────────────────────┼────────────────────────────────────────┘   │
//! │                           ▼                                             │
//! │                  bazaar-ledger (LedgerStore)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`protocol`] - wire message shapes (adjacently tagged JSON)
//! - [`bridge`] - `MessageBus` over `tokio::sync::broadcast`
//! - [`approval`] - `ApprovalGate` trait and built-in gates
//! - [`locks`] - per-resource serialization
//! - [`coordinator`] - the transaction state machine
//! - [`error`] - broker error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod approval;
pub mod bridge;
pub mod coordinator;
pub mod error;
pub mod locks;
pub mod protocol;

// =============================================================================
// Re-exports
// =============================================================================

pub use approval::{ApprovalDecision, ApprovalGate, AutoApprovalGate, DecliningGate, TradeKind, TradeReview};
pub use bridge::{spawn_ledger_forwarder, BusSubscription, MessageBus};
pub use coordinator::{CoordinatorHandle, TransactionCoordinator};
pub use error::{BrokerError, BrokerResult};
pub use locks::ResourceLocks;
pub use protocol::{ItemPurchasedPayload, OutcomePayload, TradeMessage, VendorUpdatedPayload};
