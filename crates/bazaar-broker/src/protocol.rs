//! # Trade Protocol Messages
//!
//! Message types exchanged between peers and the authority.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Trade Protocol Messages                           │
//! │                                                                         │
//! │  REQUESTS (peer → authority)                                           │
//! │  ───────────────────────────                                           │
//! │  PEER      ───► PlayerPurchaseRequest { request }                      │
//! │  PEER      ───► PlayerSellRequest { request }                          │
//! │                                                                         │
//! │  OUTCOMES (authority → requesting peer, filtered by userId)            │
//! │  ──────────────────────────────────────────────────────────            │
//! │  AUTHORITY ───► PurchaseCompleted { userId, outcome }                  │
//! │  AUTHORITY ───► PurchaseFailed    { userId, outcome }                  │
//! │  AUTHORITY ───► SellCompleted     { userId, outcome }                  │
//! │  AUTHORITY ───► SellFailed        { userId, outcome }                  │
//! │                                                                         │
//! │  CACHE INVALIDATION (authority → all)                                  │
//! │  ────────────────────────────────────                                  │
//! │  AUTHORITY ───► VendorUpdated { vendorId }                             │
//! │  AUTHORITY ───► ItemPurchased { vendorId, itemId, quantity, remaining }│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Messages are serialized as tagged JSON using serde's adjacently
//! tagged enum:
//! ```json
//! { "type": "PlayerPurchaseRequest", "payload": { ... } }
//! ```

use bazaar_core::{Stock, TransactionOutcome, TransactionRequest};
use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, BrokerResult};

// =============================================================================
// Main Message Enum (Tagged Union)
// =============================================================================

/// All trade protocol messages.
///
/// Uses serde's adjacently tagged enum for clean JSON serialization:
/// `{ "type": "PlayerPurchaseRequest", "payload": { ... } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TradeMessage {
    // =========================================================================
    // Request Messages (peer → authority)
    // =========================================================================

    /// A peer wants to buy from a vendor.
    PlayerPurchaseRequest(TransactionRequest),

    /// A peer wants to sell carried items.
    PlayerSellRequest(TransactionRequest),

    // =========================================================================
    // Outcome Messages (authority → requesting peer)
    // =========================================================================

    /// Purchase applied (possibly partially).
    PurchaseCompleted(OutcomePayload),

    /// Purchase rejected; nothing was applied.
    PurchaseFailed(OutcomePayload),

    /// Sale applied (possibly partially).
    SellCompleted(OutcomePayload),

    /// Sale rejected; nothing was applied.
    SellFailed(OutcomePayload),

    // =========================================================================
    // Cache Invalidation Messages (authority → all)
    // =========================================================================

    /// A vendor record changed; peer caches must refetch.
    VendorUpdated(VendorUpdatedPayload),

    /// One line of a purchase was applied; carries the remaining stock
    /// so peer views can update without a refetch.
    ItemPurchased(ItemPurchasedPayload),
}

impl TradeMessage {
    /// The wire tag for this message.
    pub fn type_name(&self) -> &'static str {
        match self {
            TradeMessage::PlayerPurchaseRequest(_) => "PlayerPurchaseRequest",
            TradeMessage::PlayerSellRequest(_) => "PlayerSellRequest",
            TradeMessage::PurchaseCompleted(_) => "PurchaseCompleted",
            TradeMessage::PurchaseFailed(_) => "PurchaseFailed",
            TradeMessage::SellCompleted(_) => "SellCompleted",
            TradeMessage::SellFailed(_) => "SellFailed",
            TradeMessage::VendorUpdated(_) => "VendorUpdated",
            TradeMessage::ItemPurchased(_) => "ItemPurchased",
        }
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> BrokerResult<String> {
        serde_json::to_string(self)
            .map_err(|e| BrokerError::ChannelError(format!("Serialization failed: {}", e)))
    }

    /// Deserializes from a JSON string.
    pub fn from_json(json: &str) -> BrokerResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| BrokerError::ChannelError(format!("Deserialization failed: {}", e)))
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// An outcome addressed to the requesting peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomePayload {
    /// The requesting peer; other peers ignore this message.
    pub user_id: String,
    /// The terminal outcome.
    pub outcome: TransactionOutcome,
}

/// Vendor cache invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorUpdatedPayload {
    pub vendor_id: String,
}

/// One applied purchase line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPurchasedPayload {
    pub vendor_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub remaining: Stock,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::OutcomeKind;

    #[test]
    fn test_adjacently_tagged_wire_format() {
        let msg = TradeMessage::VendorUpdated(VendorUpdatedPayload {
            vendor_id: "v-1".to_string(),
        });
        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"{"type":"VendorUpdated","payload":{"vendorId":"v-1"}}"#);

        let back = TradeMessage::from_json(&json).unwrap();
        assert_eq!(back.type_name(), "VendorUpdated");
    }

    #[test]
    fn test_outcome_round_trip() {
        let msg = TradeMessage::PurchaseFailed(OutcomePayload {
            user_id: "peer-1".to_string(),
            outcome: TransactionOutcome::failed(
                OutcomeKind::InsufficientFunds,
                "Not enough coin",
                30,
            ),
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""kind":"insufficient_funds""#));

        match TradeMessage::from_json(&json).unwrap() {
            TradeMessage::PurchaseFailed(payload) => {
                assert_eq!(payload.user_id, "peer-1");
                assert!(!payload.outcome.success);
                assert_eq!(payload.outcome.new_balance, 30);
            }
            other => panic!("unexpected message: {}", other.type_name()),
        }
    }

    #[test]
    fn test_unlimited_stock_serializes_as_null() {
        let msg = TradeMessage::ItemPurchased(ItemPurchasedPayload {
            vendor_id: "v-1".to_string(),
            item_id: "i-1".to_string(),
            quantity: 3,
            remaining: Stock::Unlimited,
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""remaining":null"#));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(TradeMessage::from_json("{\"type\":\"Nope\"}").is_err());
    }
}
