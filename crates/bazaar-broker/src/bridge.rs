//! # Message Bus
//!
//! The in-process bridge carrying [`TradeMessage`]s between peers and
//! the authority.
//!
//! ## Delivery Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Message Bus                                    │
//! │                                                                         │
//! │  publisher ──► tokio::sync::broadcast ──► every live subscriber        │
//! │                                                                         │
//! │  • at-least-once to every subscriber that keeps up                     │
//! │  • a lagged subscriber drops the oldest messages, logs, continues      │
//! │  • outcome messages carry a userId; peers ignore ones not addressed    │
//! │    to them (the bus itself does not filter)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_ledger::{LedgerEvent, LedgerStore};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{BrokerError, BrokerResult};
use crate::protocol::{OutcomePayload, TradeMessage, VendorUpdatedPayload};

/// Capacity of the bus broadcast channel.
const BUS_CAPACITY: usize = 256;

// =============================================================================
// Message Bus
// =============================================================================

/// Cloneable handle to the shared message channel.
#[derive(Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<TradeMessage>,
}

impl MessageBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        MessageBus { tx }
    }

    /// Publishes a message to every live subscriber.
    ///
    /// Returns the number of subscribers that received it; zero
    /// subscribers is not an error.
    pub fn publish(&self, message: TradeMessage) -> usize {
        debug!(message_type = message.type_name(), "Publishing message");
        self.tx.send(message).unwrap_or(0)
    }

    /// Subscribes to all bus traffic from this point on.
    pub fn subscribe(&self) -> BusSubscription {
        BusSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        MessageBus::new()
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// A receiving end of the bus.
pub struct BusSubscription {
    rx: broadcast::Receiver<TradeMessage>,
}

impl BusSubscription {
    /// Receives the next message, skipping over any lag gaps.
    pub async fn recv(&mut self) -> BrokerResult<TradeMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Ok(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Bus subscriber lagged, messages dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(BrokerError::ChannelError("Message bus closed".into()));
                }
            }
        }
    }

    /// Waits for the next outcome addressed to `user_id`.
    ///
    /// Returns the wire tag and the outcome payload; everything else on
    /// the bus is skipped.
    pub async fn outcome_for(
        &mut self,
        user_id: &str,
    ) -> BrokerResult<(&'static str, OutcomePayload)> {
        loop {
            let message = self.recv().await?;
            let tag = message.type_name();
            match message {
                TradeMessage::PurchaseCompleted(p)
                | TradeMessage::PurchaseFailed(p)
                | TradeMessage::SellCompleted(p)
                | TradeMessage::SellFailed(p)
                    if p.user_id == user_id =>
                {
                    return Ok((tag, p));
                }
                _ => continue,
            }
        }
    }
}

// =============================================================================
// Ledger Event Forwarding
// =============================================================================

/// Spawns a task translating ledger state changes into wire messages.
///
/// Vendor writes and removals both become `VendorUpdated` (peers
/// refetch either way); balance changes stay local, the peer learns its
/// new balance from the outcome message.
pub fn spawn_ledger_forwarder(bus: MessageBus, ledger: &LedgerStore) {
    let mut events = ledger.events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(LedgerEvent::VendorUpdated { vendor }) => {
                    bus.publish(TradeMessage::VendorUpdated(VendorUpdatedPayload {
                        vendor_id: vendor.id,
                    }));
                }
                Ok(LedgerEvent::VendorRemoved { vendor_id }) => {
                    bus.publish(TradeMessage::VendorUpdated(VendorUpdatedPayload {
                        vendor_id,
                    }));
                }
                Ok(LedgerEvent::BalanceChanged { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Ledger event forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{OutcomeKind, TransactionOutcome};

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = MessageBus::new();
        let delivered = bus.publish(TradeMessage::VendorUpdated(VendorUpdatedPayload {
            vendor_id: "v-1".to_string(),
        }));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let bus = MessageBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(TradeMessage::VendorUpdated(VendorUpdatedPayload {
            vendor_id: "v-1".to_string(),
        }));

        assert_eq!(a.recv().await.unwrap().type_name(), "VendorUpdated");
        assert_eq!(b.recv().await.unwrap().type_name(), "VendorUpdated");
    }

    #[tokio::test]
    async fn test_vendor_writes_reach_the_bus() {
        use bazaar_core::VendorRecord;
        use bazaar_ledger::{MemoryInventory, MemorySettings, WorldSettings};
        use std::sync::Arc;

        let settings = WorldSettings::new(Arc::new(MemorySettings::new()));
        let ledger = LedgerStore::new(settings, Arc::new(MemoryInventory::new()));
        let bus = MessageBus::new();
        spawn_ledger_forwarder(bus.clone(), &ledger);
        let mut sub = bus.subscribe();

        let vendor = VendorRecord::new("Trinkets");
        let vendor_id = vendor.id.clone();
        ledger.set_vendor(vendor).await.unwrap();

        match sub.recv().await.unwrap() {
            TradeMessage::VendorUpdated(payload) => assert_eq!(payload.vendor_id, vendor_id),
            other => panic!("unexpected message: {}", other.type_name()),
        }
    }

    #[tokio::test]
    async fn test_outcome_filtering_by_user() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe();

        let outcome = TransactionOutcome::completed("done", 10, 90);
        bus.publish(TradeMessage::PurchaseCompleted(OutcomePayload {
            user_id: "someone-else".to_string(),
            outcome: outcome.clone(),
        }));
        bus.publish(TradeMessage::VendorUpdated(VendorUpdatedPayload {
            vendor_id: "v-1".to_string(),
        }));
        bus.publish(TradeMessage::PurchaseFailed(OutcomePayload {
            user_id: "peer-1".to_string(),
            outcome: TransactionOutcome::failed(OutcomeKind::Declined, "no", 0),
        }));

        let (tag, payload) = sub.outcome_for("peer-1").await.unwrap();
        assert_eq!(tag, "PurchaseFailed");
        assert_eq!(payload.outcome.kind, OutcomeKind::Declined);
    }
}
