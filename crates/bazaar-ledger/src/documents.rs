//! # Inventory Documents
//!
//! Access to the items an actor physically carries, and the matcher
//! that recognizes which of those items are coins.
//!
//! ## Why a Trait?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The host owns actor inventories; their document shape varies by       │
//! │  deployment. The ledger only needs four operations:                    │
//! │                                                                         │
//! │    items(actor)          → Vec<ItemHandle>                             │
//! │    patch_item(actor, id) → update count/cost in place                  │
//! │    create_item(actor)    → add a new item document                     │
//! │    delete_item(actor)    → remove an item document                     │
//! │                                                                         │
//! │  CurrencyItemMatcher sits on top and maps denomination names to item   │
//! │  handles by exact name equality, so "Gold" coins are found no matter   │
//! │  how the backend stores them.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use bazaar_core::{CoinBag, DenominationSet};
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;

// =============================================================================
// Item Handles
// =============================================================================

/// A flattened view of one carried item document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemHandle {
    /// Backend document id.
    pub id: String,
    /// Display name; coin items match denominations by this, exactly.
    pub name: String,
    /// Carried count.
    pub count: i64,
    /// Unit value in display units.
    pub cost: f64,
    /// Carry weight per unit.
    pub weight: f64,
}

/// A partial update to one carried item.
///
/// `None` fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub count: Option<i64>,
    pub cost: Option<f64>,
}

impl ItemPatch {
    /// A patch that only sets the count.
    pub fn count(count: i64) -> Self {
        ItemPatch {
            count: Some(count),
            cost: None,
        }
    }
}

// =============================================================================
// Inventory Documents Trait
// =============================================================================

/// Read/write access to the items an actor carries.
#[async_trait]
pub trait InventoryDocuments: Send + Sync {
    /// All items carried by the actor. Fails with `ActorNotFound` when
    /// no such inventory exists.
    async fn items(&self, actor_id: &str) -> LedgerResult<Vec<ItemHandle>>;

    /// Applies a partial update to one item.
    async fn patch_item(&self, actor_id: &str, item_id: &str, patch: ItemPatch)
        -> LedgerResult<()>;

    /// Creates a new item document, returning its id.
    async fn create_item(&self, actor_id: &str, item: ItemHandle) -> LedgerResult<String>;

    /// Removes an item document.
    async fn delete_item(&self, actor_id: &str, item_id: &str) -> LedgerResult<()>;
}

// =============================================================================
// Currency Item Matcher
// =============================================================================

/// Recognizes coin items among an actor's carried items.
///
/// Matching is by exact name equality with the configured
/// denominations. An actor may carry several stacks of the same coin;
/// all of them are reported, in inventory order.
pub struct CurrencyItemMatcher<'a> {
    denoms: &'a DenominationSet,
}

impl<'a> CurrencyItemMatcher<'a> {
    pub fn new(denoms: &'a DenominationSet) -> Self {
        CurrencyItemMatcher { denoms }
    }

    /// Item handles matching each denomination, indexed in
    /// denomination order (descending by value).
    pub fn matches<'i>(&self, items: &'i [ItemHandle]) -> Vec<Vec<&'i ItemHandle>> {
        let mut grouped: Vec<Vec<&ItemHandle>> = vec![Vec::new(); self.denoms.len()];
        for item in items {
            if let Some(idx) = self.denoms.index_of(&item.name) {
                grouped[idx].push(item);
            }
        }
        grouped
    }

    /// Aggregates matched items into a coin bag.
    ///
    /// Counts are summed as-is, including any negative counts a
    /// corrupt document might carry; valuation rejects those later.
    pub fn coin_bag(&self, items: &[ItemHandle]) -> CoinBag {
        let mut bag = CoinBag::new();
        for item in items {
            if self.denoms.index_of(&item.name).is_some() {
                bag.add_count(&item.name, item.count);
            }
        }
        bag
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: &str, name: &str, count: i64) -> ItemHandle {
        ItemHandle {
            id: id.to_string(),
            name: name.to_string(),
            count,
            cost: 0.0,
            weight: 0.01,
        }
    }

    #[test]
    fn test_matches_by_exact_name() {
        let denoms = DenominationSet::standard();
        let matcher = CurrencyItemMatcher::new(&denoms);
        let items = vec![
            handle("a", "Gold", 2),
            handle("b", "gold", 9), // case differs: not a match
            handle("c", "Rope", 1),
            handle("d", "Copper", 5),
            handle("e", "Gold", 1),
        ];

        let grouped = matcher.matches(&items);
        assert_eq!(grouped[0].len(), 2); // Gold stacks a and e
        assert_eq!(grouped[1].len(), 0); // Silver
        assert_eq!(grouped[2].len(), 1); // Copper

        let bag = matcher.coin_bag(&items);
        assert_eq!(bag.count("Gold"), 3);
        assert_eq!(bag.count("Copper"), 5);
        assert_eq!(bag.count("Rope"), 0);
    }
}
