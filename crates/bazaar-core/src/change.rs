//! # Change Engine
//!
//! Valuation and greedy decomposition of amounts into coin counts.
//!
//! ## Greedy Change-Making
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  make_change(328) over [Gold 80, Silver 4, Copper 1]                    │
//! │                                                                         │
//! │  328 / 80 = 4 Gold   → remainder 8                                     │
//! │    8 /  4 = 2 Silver → remainder 0   (optimal: 6 coins)                │
//! │                                                                         │
//! │  Greedy is optimal for canonical ladders like 80/4/1, where each       │
//! │  denomination is a whole multiple of the next. The authority may       │
//! │  configure arbitrary sets; for those the greedy result is valid but    │
//! │  not guaranteed to be the minimum coin count. This is a documented     │
//! │  limitation, not a bug.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::currency::{CoinBag, DenominationSet};
use crate::error::{CoreError, CoreResult};

/// Sums `count × base value` over a bag.
///
/// Every count is validated to be a non-negative integer and every name
/// to be a configured denomination; malformed bags fail without any
/// partial result.
///
/// ## Example
/// ```rust
/// use bazaar_core::change::value_of;
/// use bazaar_core::currency::{CoinBag, DenominationSet};
///
/// let denoms = DenominationSet::standard();
/// let bag = CoinBag::from_counts([("Gold", 4), ("Copper", 8)]);
/// assert_eq!(value_of(&bag, &denoms).unwrap(), 328);
/// ```
pub fn value_of(bag: &CoinBag, denoms: &DenominationSet) -> CoreResult<i64> {
    let mut total = 0i64;
    for (name, count) in bag.iter() {
        if count < 0 {
            return Err(CoreError::InvalidCoinCount {
                denomination: name.clone(),
                count,
            });
        }
        let idx = denoms
            .index_of(name)
            .ok_or_else(|| CoreError::UnknownDenomination { name: name.clone() })?;
        // Counts come from persisted documents; a corrupt count large
        // enough to overflow is invalid, not a wrapping total.
        total = count
            .checked_mul(denoms.base_value(idx))
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| CoreError::InvalidCoinCount {
                denomination: name.clone(),
                count,
            })?;
    }
    Ok(total)
}

/// Greedily decomposes a non-negative base-unit amount into coins.
///
/// Iterates denominations highest-value first, taking
/// `floor(remaining / value)` coins of each. Any remainder smaller than
/// the smallest denomination stays unrepresented (impossible when the
/// smallest denomination is worth one base unit, which the multiplier
/// derivation guarantees for scale-defining sets).
pub fn make_change(total: i64, denoms: &DenominationSet) -> CoinBag {
    let mut remaining = total.max(0);
    let mut bag = CoinBag::new();
    for (idx, denom) in denoms.denominations().iter().enumerate() {
        let value = denoms.base_value(idx);
        let take = remaining / value;
        if take > 0 {
            bag.set_count(&denom.name, take);
            remaining -= take * value;
        }
    }
    bag
}

// =============================================================================
// Unit Tests
// =============================================================================
