//! # Domain Types
//!
//! Core domain types used throughout Bazaar.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │  VendorRecord   │   │   VendorItem    │   │ TransactionRequest  │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │   │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  requesting peer    │   │
//! │  │  name           │   │  price          │   │  target inventory   │   │
//! │  │  active         │   │  quantity/Stock │   │  vendor (purchase)  │   │
//! │  │  items          │   │  external_ref   │   │  lines              │   │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────────┘   │
//! │                                                                         │
//! │  VendorRecord is the persisted shape (settings store, id → record).    │
//! │  TransactionRequest/Outcome are ephemeral: they live for exactly one   │
//! │  coordinator invocation.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Stock
// =============================================================================

/// A vendor item's stock level: a bounded non-negative count or the
/// unlimited sentinel.
///
/// Serialized as `Option<i64>` — `null` means unlimited, matching how
/// host settings stores persist an absent bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<i64>", into = "Option<i64>")]
pub enum Stock {
    /// Never depletes; purchases do not change it.
    Unlimited,
    /// Bounded count; never negative, removed from the vendor at zero.
    Count(i64),
}

impl Stock {
    /// Whether `quantity` units can be taken.
    pub fn covers(&self, quantity: i64) -> bool {
        match self {
            Stock::Unlimited => true,
            Stock::Count(n) => *n >= quantity,
        }
    }

    /// Applies a delta, clamping at zero. Unlimited stock is unchanged.
    pub fn adjusted(&self, delta: i64) -> Stock {
        match self {
            Stock::Unlimited => Stock::Unlimited,
            Stock::Count(n) => Stock::Count((n + delta).max(0)),
        }
    }

    /// Whether the stock has reached zero.
    pub fn is_depleted(&self) -> bool {
        matches!(self, Stock::Count(0))
    }

    /// The bounded count, if any.
    pub fn count(&self) -> Option<i64> {
        match self {
            Stock::Unlimited => None,
            Stock::Count(n) => Some(*n),
        }
    }
}

impl From<Option<i64>> for Stock {
    fn from(value: Option<i64>) -> Self {
        match value {
            None => Stock::Unlimited,
            Some(n) => Stock::Count(n.max(0)),
        }
    }
}

impl From<Stock> for Option<i64> {
    fn from(stock: Stock) -> Self {
        stock.count()
    }
}

// =============================================================================
// Vendor Item
// =============================================================================

/// One line of a vendor's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorItem {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to peers.
    pub name: String,

    /// Non-negative price per unit, in display units.
    pub price: f64,

    /// Remaining stock.
    pub quantity: Stock,

    /// Carry weight per unit.
    #[serde(default)]
    pub weight: f64,

    /// Reference into the host's catalog/compendium, when the item was
    /// imported from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
}

impl VendorItem {
    /// Creates an item with a fresh UUID.
    pub fn new(name: impl Into<String>, price: f64, quantity: Stock) -> Self {
        VendorItem {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            price,
            quantity,
            weight: 0.0,
            external_ref: None,
        }
    }
}

// =============================================================================
// Stock Generation Parameters
// =============================================================================

/// Parameters the authority uses when (re)stocking a vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    /// Minimum quantity rolled per generated item.
    pub quantity_min: i64,
    /// Maximum quantity rolled per generated item.
    pub quantity_max: i64,
    /// Multiplier applied to catalog prices on import.
    pub price_multiplier: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            quantity_min: 1,
            quantity_max: 5,
            price_multiplier: 1.0,
        }
    }
}

// =============================================================================
// Vendor Record
// =============================================================================

/// A named inventory peers can buy from and sell to.
///
/// Persisted as an id → record map in the shared settings store, which
/// is the single source of truth; peer-side views are caches
/// invalidated by `VendorUpdated` broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRecord {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Inactive vendors are hidden from peers and reject requests.
    pub active: bool,

    /// Ordered item list.
    pub items: Vec<VendorItem>,

    /// Stock/price generation parameters.
    #[serde(default)]
    pub generation: GenerationParams,

    /// When the vendor was created.
    pub created_at: DateTime<Utc>,

    /// When the vendor was last updated.
    pub updated_at: DateTime<Utc>,
}

impl VendorRecord {
    /// Creates an active, empty vendor with a fresh UUID.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        VendorRecord {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            active: true,
            items: Vec::new(),
            generation: GenerationParams::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Finds an item by id.
    pub fn find_item(&self, item_id: &str) -> Option<&VendorItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Finds an item by id, mutably.
    pub fn find_item_mut(&mut self, item_id: &str) -> Option<&mut VendorItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    /// Bumps the updated timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// =============================================================================
// Transaction Request
// =============================================================================

/// One line of a purchase or sell request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLine {
    /// Vendor item id (purchase) or inventory item id (sale).
    pub item_id: String,

    /// Display name, frozen at request time for messages.
    pub name: String,

    /// Requested unit count.
    pub quantity: i64,

    /// Unit price in display units, frozen at request time.
    pub unit_price: f64,
}

impl RequestLine {
    /// Line value in display units.
    pub fn line_value(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// A purchase or sell request from a peer.
///
/// Ephemeral: exists only for the duration of one coordinator
/// invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Peer submitting the request.
    pub requesting_peer_id: String,

    /// Inventory document receiving (purchase) or supplying (sale) the
    /// goods.
    pub target_inventory_id: String,

    /// Vendor being bought from; purchases only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,

    /// Requested lines.
    pub lines: Vec<RequestLine>,
}

// =============================================================================
// Transaction Outcome
// =============================================================================

/// Terminal state of a coordinator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Request applied (possibly partially, see the message).
    Completed,
    /// No line had sufficient stock/holdings.
    InsufficientStock,
    /// Purchase total exceeded the peer's balance.
    InsufficientFunds,
    /// The authority declined the request.
    Declined,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OutcomeKind::Completed => "completed",
            OutcomeKind::InsufficientStock => "failed-insufficient-stock",
            OutcomeKind::InsufficientFunds => "failed-insufficient-funds",
            OutcomeKind::Declined => "declined",
        };
        write!(f, "{}", label)
    }
}

/// Result of a coordinator invocation, delivered to the requesting
/// peer only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    /// Whether anything was applied.
    pub success: bool,

    /// Terminal state.
    pub kind: OutcomeKind,

    /// Human-readable summary, including any per-line rejections.
    pub message: String,

    /// Base-unit amount actually charged or paid out.
    pub affected_amount: i64,

    /// The peer's balance after settlement, in base units.
    pub new_balance: i64,
}

impl TransactionOutcome {
    /// A completed outcome.
    pub fn completed(message: impl Into<String>, affected_amount: i64, new_balance: i64) -> Self {
        TransactionOutcome {
            success: true,
            kind: OutcomeKind::Completed,
            message: message.into(),
            affected_amount,
            new_balance,
        }
    }

    /// A failed outcome of the given kind; nothing was applied.
    pub fn failed(kind: OutcomeKind, message: impl Into<String>, new_balance: i64) -> Self {
        TransactionOutcome {
            success: false,
            kind,
            message: message.into(),
            affected_amount: 0,
            new_balance,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_covers_and_adjusts() {
        assert!(Stock::Unlimited.covers(1_000_000));
        assert!(Stock::Count(3).covers(3));
        assert!(!Stock::Count(2).covers(3));

        assert_eq!(Stock::Count(2).adjusted(-5), Stock::Count(0));
        assert_eq!(Stock::Unlimited.adjusted(-5), Stock::Unlimited);
        assert!(Stock::Count(2).adjusted(-2).is_depleted());
    }

    #[test]
    fn test_stock_serde_null_sentinel() {
        let unlimited = serde_json::to_string(&Stock::Unlimited).unwrap();
        assert_eq!(unlimited, "null");
        let bounded: Stock = serde_json::from_str("4").unwrap();
        assert_eq!(bounded, Stock::Count(4));
        let negative: Stock = serde_json::from_str("-2").unwrap();
        assert_eq!(negative, Stock::Count(0));
    }

    #[test]
    fn test_vendor_find_item() {
        let mut vendor = VendorRecord::new("Trinkets");
        let item = VendorItem::new("Lantern", 12.0, Stock::Count(2));
        let id = item.id.clone();
        vendor.items.push(item);

        assert!(vendor.find_item(&id).is_some());
        assert!(vendor.find_item("missing").is_none());
    }

    #[test]
    fn test_outcome_kind_labels() {
        assert_eq!(OutcomeKind::Completed.to_string(), "completed");
        assert_eq!(
            OutcomeKind::InsufficientStock.to_string(),
            "failed-insufficient-stock"
        );
        assert_eq!(
            OutcomeKind::InsufficientFunds.to_string(),
            "failed-insufficient-funds"
        );
        assert_eq!(OutcomeKind::Declined.to_string(), "declined");
    }

    #[test]
    fn test_request_line_value() {
        let line = RequestLine {
            item_id: "i1".to_string(),
            name: "Rope".to_string(),
            quantity: 3,
            unit_price: 1.5,
        };
        assert!((line.line_value() - 4.5).abs() < 1e-9);
    }
}
