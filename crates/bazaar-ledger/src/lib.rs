//! # bazaar-ledger: Persistence Layer for Bazaar
//!
//! World settings, inventory documents, and the ledger store the
//! coordinator reads and writes through.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Data Flow                                 │
//! │                                                                         │
//! │  TransactionCoordinator (bazaar-broker)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  bazaar-ledger (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LedgerStore  │    │ WorldSettings │    │  Inventory   │  │   │
//! │  │   │  (store.rs)   │    │ (settings.rs) │    │  Documents   │  │   │
//! │  │   │               │    │               │    │(documents.rs)│  │   │
//! │  │   │ balances      │◄───│ typed keys    │    │ ItemHandle   │  │   │
//! │  │   │ vendors/stock │    │ over raw JSON │    │ coin matcher │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  │              ┌─────────────────┴──────────────┐               │   │
//! │  │              ▼                                ▼               │   │
//! │  │      MemorySettings (memory.rs)    SqliteSettings (sqlite.rs) │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`settings`] - `SettingsStore` trait, keys, typed `WorldSettings`
//! - [`documents`] - `InventoryDocuments` trait and coin item matching
//! - [`memory`] - in-process backends (tests, single-process embeds)
//! - [`sqlite`] - sqlx-backed settings store
//! - [`store`] - the `LedgerStore` facade and its events
//! - [`error`] - ledger error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod documents;
pub mod error;
pub mod memory;
pub mod settings;
pub mod sqlite;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use documents::{CurrencyItemMatcher, InventoryDocuments, ItemHandle, ItemPatch};
pub use error::{LedgerError, LedgerResult};
pub use memory::{MemoryInventory, MemorySettings};
pub use settings::{SettingChange, SettingsStore, WorldSettings};
pub use sqlite::{SqliteSettings, StoreConfig};
pub use store::{LedgerEvent, LedgerStore};
