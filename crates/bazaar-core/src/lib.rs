//! # bazaar-core: Pure Trading Logic for Bazaar
//!
//! This crate is the **heart** of Bazaar. It contains all currency and
//! wallet arithmetic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Bazaar Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  bazaar-broker (Coordinator)                    │   │
//! │  │    message bus ──► approval gate ──► transaction coordinator   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  bazaar-ledger (Persistence)                    │   │
//! │  │    settings store, inventory documents, balance accessors      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ currency  │  │  change   │  │  wallet   │  │   types   │  │   │
//! │  │   │  Denom-   │  │ value_of  │  │  Wallet   │  │  Vendor   │  │   │
//! │  │   │ inations  │  │make_change│  │ add/sub   │  │  Request  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`currency`] - Denomination sets, base-unit scaling, coin bags
//! - [`change`] - Valuation and greedy change-making
//! - [`wallet`] - Wallet construction, add, and cascade subtract
//! - [`types`] - Domain types (VendorRecord, TransactionRequest, etc.)
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All arithmetic is on i64 base units, never floats
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::currency::{CoinBag, DenominationSet};
//! use bazaar_core::wallet::{Wallet, WalletPolicy};
//!
//! let denoms = DenominationSet::standard(); // Gold 80 / Silver 4 / Copper 1
//! let bag = CoinBag::from_counts([("Gold", 11), ("Silver", 12), ("Copper", 2)]);
//!
//! let mut wallet = Wallet::new(&bag, WalletPolicy::optimize_all(), &denoms).unwrap();
//! assert_eq!(wallet.total(), 930);
//!
//! wallet.subtract(615).unwrap();
//! assert_eq!(wallet.total(), 315);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod change;
pub mod currency;
pub mod error;
pub mod types;
pub mod wallet;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use bazaar_core::Wallet` instead of
// `use bazaar_core::wallet::Wallet`

pub use change::{make_change, value_of};
pub use currency::{CoinBag, Denomination, DenominationSet};
pub use error::{CoreError, CoreResult};
pub use types::*;
pub use wallet::{Wallet, WalletPolicy};
