//! # Wallet Module
//!
//! In-memory coin-count aggregate with configurable normalization.
//!
//! ## Policy Switches
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  optimize_on_construct  initial bag is re-decomposed via make_change   │
//! │  optimize_on_add        add() re-decomposes the new total              │
//! │  optimize_on_subtract   subtract() re-decomposes the new total         │
//! │                                                                         │
//! │  With a switch OFF the wallet preserves exact coin counts:             │
//! │  • adds go to the matching denomination (or the smallest one)          │
//! │  • subtraction spends smallest-first, breaking exactly one coin of     │
//! │    the next larger denomination when the current one runs out, and     │
//! │    NEVER promotes small coins into larger ones                         │
//! │                                                                         │
//! │  The preserve-exact mode is what the ledger uses when writing coin     │
//! │  counts back onto physical inventory items: the peer keeps the coins   │
//! │  they actually carry.                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `Wallet` is a transient computation owned by a single operation; it
//! is never shared across concurrent requests.

use crate::change::{make_change, value_of};
use crate::currency::{CoinBag, DenominationSet};
use crate::error::{CoreError, CoreResult};

// =============================================================================
// Wallet Policy
// =============================================================================

/// The three independent normalization switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletPolicy {
    /// Re-decompose the initial bag on construction.
    pub optimize_on_construct: bool,
    /// Re-decompose the whole wallet after every add.
    pub optimize_on_add: bool,
    /// Re-decompose the whole wallet after every subtract.
    pub optimize_on_subtract: bool,
}

impl WalletPolicy {
    /// All switches on: the wallet always holds the minimal greedy
    /// decomposition of its total.
    pub const fn optimize_all() -> Self {
        WalletPolicy {
            optimize_on_construct: true,
            optimize_on_add: true,
            optimize_on_subtract: true,
        }
    }

    /// All switches off: coin counts are preserved exactly.
    pub const fn preserve_exact() -> Self {
        WalletPolicy {
            optimize_on_construct: false,
            optimize_on_add: false,
            optimize_on_subtract: false,
        }
    }
}

impl Default for WalletPolicy {
    fn default() -> Self {
        WalletPolicy::optimize_all()
    }
}

// =============================================================================
// Wallet
// =============================================================================

/// A coin-count aggregate over a denomination set.
///
/// Counts are kept as a vector aligned with the denomination order
/// (descending by value); they are validated non-negative on
/// construction and every mutation preserves that invariant.
#[derive(Debug, Clone)]
pub struct Wallet<'a> {
    counts: Vec<i64>,
    policy: WalletPolicy,
    denoms: &'a DenominationSet,
}

impl<'a> Wallet<'a> {
    /// Builds a wallet from a coin bag.
    ///
    /// Fails with `InvalidCoinCount`/`UnknownDenomination` when the bag
    /// is malformed. With `optimize_on_construct` the bag is
    /// immediately re-decomposed.
    pub fn new(bag: &CoinBag, policy: WalletPolicy, denoms: &'a DenominationSet) -> CoreResult<Self> {
        let total = value_of(bag, denoms)?;
        let source = if policy.optimize_on_construct {
            make_change(total, denoms)
        } else {
            bag.clone()
        };

        let mut counts = vec![0i64; denoms.len()];
        for (name, count) in source.iter() {
            // index_of cannot fail here: value_of validated every name
            if let Some(idx) = denoms.index_of(name) {
                counts[idx] = count;
            }
        }

        Ok(Wallet {
            counts,
            policy,
            denoms,
        })
    }

    /// An empty wallet.
    pub fn empty(policy: WalletPolicy, denoms: &'a DenominationSet) -> Self {
        Wallet {
            counts: vec![0i64; denoms.len()],
            policy,
            denoms,
        }
    }

    /// Total value in base units.
    pub fn total(&self) -> i64 {
        self.counts
            .iter()
            .enumerate()
            .map(|(idx, count)| count * self.denoms.base_value(idx))
            .sum()
    }

    /// Count held for a denomination (0 for unknown names).
    pub fn count(&self, name: &str) -> i64 {
        self.denoms
            .index_of(name)
            .map(|idx| self.counts[idx])
            .unwrap_or(0)
    }

    /// Snapshot of the wallet as a coin bag (zero counts omitted).
    pub fn to_bag(&self) -> CoinBag {
        let mut bag = CoinBag::new();
        for (idx, denom) in self.denoms.denominations().iter().enumerate() {
            if self.counts[idx] > 0 {
                bag.set_count(&denom.name, self.counts[idx]);
            }
        }
        bag
    }

    /// Per-denomination counts in denomination order, including zeros.
    pub fn counts(&self) -> &[i64] {
        &self.counts
    }

    /// Adds a base-unit amount.
    ///
    /// With `optimize_on_add` the whole wallet is re-decomposed;
    /// otherwise the amount lands on the smallest denomination
    /// directly, failing with `AmountNotRepresentable` when it is not a
    /// whole number of smallest-denomination coins.
    pub fn add_amount(&mut self, amount: i64) -> CoreResult<()> {
        if amount < 0 {
            return Err(CoreError::NegativeAmount { amount });
        }
        if self.policy.optimize_on_add {
            self.replace_with_change(self.total() + amount);
            return Ok(());
        }

        let smallest = self.denoms.smallest_base();
        if amount % smallest != 0 {
            return Err(CoreError::AmountNotRepresentable { amount, smallest });
        }
        let last = self.counts.len() - 1;
        self.counts[last] += amount / smallest;
        Ok(())
    }

    /// Adds the coins of another bag.
    ///
    /// With `optimize_on_add` the combined total is re-decomposed;
    /// otherwise each denomination's count increases directly with no
    /// cross-denomination normalization.
    pub fn add_bag(&mut self, bag: &CoinBag) -> CoreResult<()> {
        let added = value_of(bag, self.denoms)?;
        if self.policy.optimize_on_add {
            self.replace_with_change(self.total() + added);
            return Ok(());
        }
        for (name, count) in bag.iter() {
            if let Some(idx) = self.denoms.index_of(name) {
                self.counts[idx] += count;
            }
        }
        Ok(())
    }

    /// Subtracts a base-unit amount.
    ///
    /// Fails with `InsufficientFunds` (reporting the shortfall) when
    /// the wallet total is below `amount`; the wallet is unmodified on
    /// failure. With `optimize_on_subtract` the remainder is
    /// re-decomposed; otherwise coins are spent smallest-first with the
    /// break-one-coin cascade.
    pub fn subtract(&mut self, amount: i64) -> CoreResult<()> {
        if amount < 0 {
            return Err(CoreError::NegativeAmount { amount });
        }
        let available = self.total();
        if available < amount {
            return Err(CoreError::InsufficientFunds {
                requested: amount,
                available,
                shortfall: amount - available,
            });
        }

        if self.policy.optimize_on_subtract {
            self.replace_with_change(available - amount);
        } else {
            self.spend_exact(amount);
        }
        Ok(())
    }

    /// Replaces the counts with the greedy decomposition of `total`.
    fn replace_with_change(&mut self, total: i64) {
        let bag = make_change(total, self.denoms);
        for (idx, denom) in self.denoms.denominations().iter().enumerate() {
            self.counts[idx] = bag.count(&denom.name);
        }
    }

    /// Spends `amount` smallest-denomination-first.
    ///
    /// When the smallest non-empty denomination is worth more than what
    /// is still owed, exactly one of its coins is broken into the
    /// equivalent smaller units and spending continues. Coins are never
    /// promoted into larger denominations. Exact for canonical ladders
    /// (each denomination a whole multiple of the next); for other sets
    /// any sub-smallest-unit remainder of a broken coin is forfeited.
    fn spend_exact(&mut self, amount: i64) {
        let len = self.counts.len();
        let mut owed = amount;

        while owed > 0 {
            // Smallest denomination with coins left; total() was
            // checked, so one always exists while owed > 0.
            let Some(idx) = (0..len).rev().find(|&i| self.counts[i] > 0) else {
                break;
            };
            let value = self.denoms.base_value(idx);

            if value <= owed {
                let take = (owed / value).min(self.counts[idx]);
                self.counts[idx] -= take;
                owed -= take * value;
            } else {
                // Break one coin into smaller units, largest-first.
                self.counts[idx] -= 1;
                let mut rest = value;
                for smaller in idx + 1..len {
                    let smaller_value = self.denoms.base_value(smaller);
                    let gained = rest / smaller_value;
                    self.counts[smaller] += gained;
                    rest -= gained * smaller_value;
                }
                // rest is 0 for canonical ladders
                owed -= rest;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
