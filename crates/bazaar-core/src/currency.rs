//! # Currency Module
//!
//! Denomination configuration and the integer base-unit scale.
//!
//! ## Why Integer Base Units?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Display-level prices are rationals: 0.1 + 0.2 = 0.30000000000000004   │
//! │                                                                         │
//! │  OUR SOLUTION: scale once at the boundary                               │
//! │    The smallest denomination's fractional part fixes a power-of-ten    │
//! │    multiplier; every amount is converted to an integer count of base   │
//! │    units BEFORE any arithmetic happens.                                │
//! │                                                                         │
//! │  Denominations [Gold 80, Silver 4, Copper 1]  → multiplier 1           │
//! │  Denominations [Gold 1, Silver 0.1, Copper 0.01] → multiplier 100      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::currency::DenominationSet;
//!
//! let denoms = DenominationSet::standard();
//! assert_eq!(denoms.to_base(3.0), 3);
//! assert_eq!(denoms.base_value(0), 80); // Gold
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Maximum number of decimal places a denomination value may carry.
const MAX_SCALE_DIGITS: u32 = 8;

/// Tolerance when deciding whether a scaled value is integral.
const SCALE_EPSILON: f64 = 1e-6;

// =============================================================================
// Denomination
// =============================================================================

/// A named unit of currency with a value and a carry weight.
///
/// `value` is expressed in display units (the authority edits these);
/// all arithmetic uses the scaled integer form held by
/// [`DenominationSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Denomination {
    /// Unique display name; inventory coin items are matched to this by
    /// exact name equality.
    pub name: String,

    /// Positive value in display units.
    pub value: f64,

    /// Non-negative carry weight per coin.
    #[serde(default)]
    pub weight: f64,
}

impl Denomination {
    /// Creates a denomination.
    pub fn new(name: impl Into<String>, value: f64, weight: f64) -> Self {
        Denomination {
            name: name.into(),
            value,
            weight,
        }
    }
}

// =============================================================================
// Denomination Set
// =============================================================================

/// The ordered, validated denomination configuration.
///
/// Invariants (enforced on construction and on deserialization):
/// - non-empty, sorted descending by value
/// - names unique, values unique
/// - every value positive and finite, every weight non-negative
/// - every value integral after scaling by the base-unit multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Denomination>", into = "Vec<Denomination>")]
pub struct DenominationSet {
    denominations: Vec<Denomination>,
    /// Integer value of each denomination in base units, same order.
    base_values: Vec<i64>,
    /// Power-of-ten factor converting display amounts to base units.
    multiplier: i64,
}

impl DenominationSet {
    /// Validates and builds a denomination set.
    ///
    /// The list is sorted descending by value; the base-unit multiplier
    /// is derived from the smallest denomination's fractional part.
    pub fn new(mut denominations: Vec<Denomination>) -> CoreResult<Self> {
        if denominations.is_empty() {
            return Err(CoreError::InvalidDenominations {
                reason: "denomination list is empty".to_string(),
            });
        }

        for d in &denominations {
            if !d.value.is_finite() || d.value <= 0.0 {
                return Err(CoreError::InvalidDenominations {
                    reason: format!("denomination {} has non-positive value {}", d.name, d.value),
                });
            }
            if !d.weight.is_finite() || d.weight < 0.0 {
                return Err(CoreError::InvalidDenominations {
                    reason: format!("denomination {} has negative weight {}", d.name, d.weight),
                });
            }
        }

        denominations.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Uniqueness of names and values
        let mut seen_names: BTreeMap<&str, ()> = BTreeMap::new();
        for d in &denominations {
            if seen_names.insert(d.name.as_str(), ()).is_some() {
                return Err(CoreError::InvalidDenominations {
                    reason: format!("duplicate denomination name {}", d.name),
                });
            }
        }
        for pair in denominations.windows(2) {
            if (pair[0].value - pair[1].value).abs() < SCALE_EPSILON {
                return Err(CoreError::InvalidDenominations {
                    reason: format!(
                        "denominations {} and {} share the value {}",
                        pair[0].name, pair[1].name, pair[0].value
                    ),
                });
            }
        }

        // Smallest value (last after descending sort) fixes the scale.
        let smallest = denominations
            .last()
            .map(|d| d.value)
            .unwrap_or(1.0);
        let multiplier = derive_multiplier(smallest).ok_or(CoreError::InvalidDenominations {
            reason: format!(
                "smallest denomination value {} needs more than {} decimal places",
                smallest, MAX_SCALE_DIGITS
            ),
        })?;

        let mut base_values = Vec::with_capacity(denominations.len());
        for d in &denominations {
            let scaled = d.value * multiplier as f64;
            if (scaled - scaled.round()).abs() > SCALE_EPSILON {
                return Err(CoreError::InvalidDenominations {
                    reason: format!(
                        "denomination {} value {} is not integral at scale {}",
                        d.name, d.value, multiplier
                    ),
                });
            }
            base_values.push(scaled.round() as i64);
        }

        Ok(DenominationSet {
            denominations,
            base_values,
            multiplier,
        })
    }

    /// The standard Gold/Silver/Copper set with 80/4/1 ratios.
    ///
    /// Greedy change-making is provably optimal for this ladder.
    pub fn standard() -> Self {
        DenominationSet {
            denominations: vec![
                Denomination::new("Gold", 80.0, 0.01),
                Denomination::new("Silver", 4.0, 0.01),
                Denomination::new("Copper", 1.0, 0.01),
            ],
            base_values: vec![80, 4, 1],
            multiplier: 1,
        }
    }

    /// Number of denominations.
    #[inline]
    pub fn len(&self) -> usize {
        self.denominations.len()
    }

    /// Whether the set is empty (never true for a validated set).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.denominations.is_empty()
    }

    /// The denominations, sorted descending by value.
    #[inline]
    pub fn denominations(&self) -> &[Denomination] {
        &self.denominations
    }

    /// Base-unit value of the denomination at `idx`.
    #[inline]
    pub fn base_value(&self, idx: usize) -> i64 {
        self.base_values[idx]
    }

    /// Index of the denomination with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.denominations.iter().position(|d| d.name == name)
    }

    /// The smallest (last) denomination.
    pub fn smallest(&self) -> &Denomination {
        &self.denominations[self.denominations.len() - 1]
    }

    /// Base-unit value of the smallest denomination.
    #[inline]
    pub fn smallest_base(&self) -> i64 {
        self.base_values[self.base_values.len() - 1]
    }

    /// The power-of-ten factor converting display amounts to base units.
    #[inline]
    pub fn multiplier(&self) -> i64 {
        self.multiplier
    }

    /// Converts a display amount to base units, rounding to nearest.
    pub fn to_base(&self, amount: f64) -> i64 {
        (amount * self.multiplier as f64).round() as i64
    }

    /// Converts a display amount to base units, rounding up.
    ///
    /// Used for purchase totals: the buyer pays at least the full value
    /// even when line prices do not land on a whole base unit.
    pub fn to_base_ceil(&self, amount: f64) -> i64 {
        // Guard against 3.0000000000000004-style float noise pushing a
        // whole amount up a unit.
        let scaled = amount * self.multiplier as f64;
        if (scaled - scaled.round()).abs() < SCALE_EPSILON {
            scaled.round() as i64
        } else {
            scaled.ceil() as i64
        }
    }

    /// Converts base units back to a display amount.
    pub fn to_display(&self, base: i64) -> f64 {
        base as f64 / self.multiplier as f64
    }
}

impl TryFrom<Vec<Denomination>> for DenominationSet {
    type Error = CoreError;

    fn try_from(denominations: Vec<Denomination>) -> Result<Self, Self::Error> {
        DenominationSet::new(denominations)
    }
}

impl From<DenominationSet> for Vec<Denomination> {
    fn from(set: DenominationSet) -> Self {
        set.denominations
    }
}

/// Finds the smallest power of ten that makes `value` integral.
fn derive_multiplier(value: f64) -> Option<i64> {
    let mut multiplier = 1i64;
    for _ in 0..=MAX_SCALE_DIGITS {
        let scaled = value * multiplier as f64;
        if (scaled - scaled.round()).abs() < SCALE_EPSILON && scaled.round() >= 1.0 {
            return Some(multiplier);
        }
        multiplier *= 10;
    }
    None
}

// =============================================================================
// Coin Bag
// =============================================================================

/// A count of coins per denomination name.
///
/// Counts are stored as `i64` so that malformed input (negative counts
/// from an untrusted document) can be represented and rejected by
/// [`crate::change::value_of`] instead of silently clamped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinBag(BTreeMap<String, i64>);

impl CoinBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        CoinBag(BTreeMap::new())
    }

    /// Builds a bag from name/count pairs.
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        CoinBag(
            counts
                .into_iter()
                .map(|(name, count)| (name.into(), count))
                .collect(),
        )
    }

    /// Count for a denomination (0 when absent).
    pub fn count(&self, name: &str) -> i64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    /// Sets the count for a denomination; a zero count removes the key.
    pub fn set_count(&mut self, name: &str, count: i64) {
        if count == 0 {
            self.0.remove(name);
        } else {
            self.0.insert(name.to_string(), count);
        }
    }

    /// Adds to the count for a denomination.
    pub fn add_count(&mut self, name: &str, delta: i64) {
        let next = self.count(name) + delta;
        self.set_count(name, next);
    }

    /// Iterates name/count entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, i64)> {
        self.0.iter().map(|(name, count)| (name, *count))
    }

    /// Total number of physical coins in the bag.
    pub fn coin_total(&self) -> i64 {
        self.0.values().sum()
    }

    /// Whether the bag holds no coins.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
