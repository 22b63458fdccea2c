//! End-to-end coordinator tests over in-process backends.

use std::sync::Arc;
use std::time::Duration;

use bazaar_broker::{
    ApprovalGate, AutoApprovalGate, BusSubscription, CoordinatorHandle, DecliningGate,
    MessageBus, OutcomePayload, TradeMessage, TransactionCoordinator, VendorUpdatedPayload,
};
use bazaar_core::{
    OutcomeKind, RequestLine, Stock, TransactionRequest, VendorItem, VendorRecord,
};
use bazaar_ledger::{
    InventoryDocuments, ItemHandle, LedgerStore, MemoryInventory, MemorySettings, WorldSettings,
};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct World {
    ledger: LedgerStore,
    inventory: Arc<MemoryInventory>,
    bus: MessageBus,
    handle: CoordinatorHandle,
}

async fn world_with_gate(gate: Arc<dyn ApprovalGate>, require_approval: bool) -> World {
    let settings = WorldSettings::new(Arc::new(MemorySettings::new()));
    settings.set_require_approval(require_approval).await.unwrap();

    let inventory = Arc::new(MemoryInventory::new());
    let ledger = LedgerStore::new(settings, inventory.clone());
    let bus = MessageBus::new();
    let handle =
        TransactionCoordinator::new(ledger.clone(), bus.clone(), gate, true).start();

    World {
        ledger,
        inventory,
        bus,
        handle,
    }
}

async fn world() -> World {
    world_with_gate(Arc::new(AutoApprovalGate::new()), false).await
}

/// Creates a vendor with one Lantern item and returns (vendor_id, item_id).
async fn lantern_vendor(world: &World, stock: Stock) -> (String, String) {
    let mut vendor = VendorRecord::new("General Goods");
    let item = VendorItem::new("Lantern", 12.0, stock);
    let item_id = item.id.clone();
    vendor.items.push(item);
    let vendor_id = vendor.id.clone();
    world.ledger.set_vendor(vendor).await.unwrap();
    (vendor_id, item_id)
}

fn purchase(peer: &str, vendor_id: &str, lines: Vec<RequestLine>) -> TransactionRequest {
    TransactionRequest {
        requesting_peer_id: peer.to_string(),
        target_inventory_id: peer.to_string(),
        vendor_id: Some(vendor_id.to_string()),
        lines,
    }
}

fn line(item_id: &str, name: &str, quantity: i64, unit_price: f64) -> RequestLine {
    RequestLine {
        item_id: item_id.to_string(),
        name: name.to_string(),
        quantity,
        unit_price,
    }
}

async fn outcome(sub: &mut BusSubscription, peer: &str) -> (&'static str, OutcomePayload) {
    timeout(WAIT, sub.outcome_for(peer))
        .await
        .expect("timed out waiting for outcome")
        .unwrap()
}

#[tokio::test]
async fn purchase_charges_delivers_and_decrements_stock() {
    let world = world().await;
    let (vendor_id, item_id) = lantern_vendor(&world, Stock::Count(4)).await;
    world.ledger.set_balance("peer-1", 930).await.unwrap();
    world.inventory.ensure_actor("peer-1").await;

    let mut sub = world.bus.subscribe();
    // Requests arrive over the bus like any peer would send them
    world.bus.publish(TradeMessage::PlayerPurchaseRequest(purchase(
        "peer-1",
        &vendor_id,
        vec![line(&item_id, "Lantern", 2, 12.0)],
    )));

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "PurchaseCompleted");
    assert_eq!(payload.outcome.kind, OutcomeKind::Completed);
    assert_eq!(payload.outcome.affected_amount, 24);
    assert_eq!(payload.outcome.new_balance, 906);

    let vendor = world.ledger.get_vendor(&vendor_id).await.unwrap();
    assert_eq!(vendor.find_item(&item_id).unwrap().quantity, Stock::Count(2));

    let carried = world.inventory.items("peer-1").await.unwrap();
    assert_eq!(carried.len(), 1);
    assert_eq!(carried[0].name, "Lantern");
    assert_eq!(carried[0].count, 2);
    assert_eq!(world.ledger.get_balance("peer-1").await.unwrap(), 906);
}

#[tokio::test]
async fn purchase_announces_each_applied_line() {
    let world = world().await;
    let (vendor_id, item_id) = lantern_vendor(&world, Stock::Count(4)).await;
    world.ledger.set_balance("peer-1", 100).await.unwrap();
    world.inventory.ensure_actor("peer-1").await;

    let mut sub = world.bus.subscribe();
    world
        .handle
        .purchase(purchase(
            "peer-1",
            &vendor_id,
            vec![line(&item_id, "Lantern", 2, 12.0)],
        ))
        .await
        .unwrap();

    let mut purchased_lines = 0;
    loop {
        let message = timeout(WAIT, sub.recv()).await.unwrap().unwrap();
        match message {
            TradeMessage::ItemPurchased(payload) => {
                assert_eq!(payload.vendor_id, vendor_id);
                assert_eq!(payload.quantity, 2);
                assert_eq!(payload.remaining, Stock::Count(2));
                purchased_lines += 1;
            }
            TradeMessage::PurchaseCompleted(_) => break,
            _ => {}
        }
    }
    assert_eq!(purchased_lines, 1);
}

#[tokio::test]
async fn purchase_continues_past_unavailable_lines() {
    let world = world().await;
    let (vendor_id, item_id) = lantern_vendor(&world, Stock::Count(4)).await;
    world.ledger.set_balance("peer-1", 930).await.unwrap();
    world.inventory.ensure_actor("peer-1").await;

    let mut sub = world.bus.subscribe();
    world
        .handle
        .purchase(purchase(
            "peer-1",
            &vendor_id,
            vec![
                line(&item_id, "Lantern", 2, 12.0),
                line("no-such-item", "Phantom Blade", 1, 50.0),
            ],
        ))
        .await
        .unwrap();

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "PurchaseCompleted");
    // Only the available line is charged
    assert_eq!(payload.outcome.affected_amount, 24);
    assert!(payload.outcome.message.contains("Phantom Blade"));
}

#[tokio::test]
async fn purchase_fails_when_nothing_in_stock() {
    let world = world().await;
    let (vendor_id, item_id) = lantern_vendor(&world, Stock::Count(1)).await;
    world.ledger.set_balance("peer-1", 930).await.unwrap();
    world.inventory.ensure_actor("peer-1").await;

    let mut sub = world.bus.subscribe();
    world
        .handle
        .purchase(purchase(
            "peer-1",
            &vendor_id,
            vec![line(&item_id, "Lantern", 3, 12.0)],
        ))
        .await
        .unwrap();

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "PurchaseFailed");
    assert_eq!(payload.outcome.kind, OutcomeKind::InsufficientStock);
    assert_eq!(payload.outcome.affected_amount, 0);

    // Nothing changed
    let vendor = world.ledger.get_vendor(&vendor_id).await.unwrap();
    assert_eq!(vendor.find_item(&item_id).unwrap().quantity, Stock::Count(1));
    assert_eq!(world.ledger.get_balance("peer-1").await.unwrap(), 930);
}

#[tokio::test]
async fn purchase_rejects_whole_request_on_short_funds() {
    let world = world().await;
    let (vendor_id, item_id) = lantern_vendor(&world, Stock::Count(4)).await;
    world.ledger.set_balance("peer-1", 10).await.unwrap();
    world.inventory.ensure_actor("peer-1").await;

    let mut sub = world.bus.subscribe();
    world
        .handle
        .purchase(purchase(
            "peer-1",
            &vendor_id,
            vec![line(&item_id, "Lantern", 2, 12.0)],
        ))
        .await
        .unwrap();

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "PurchaseFailed");
    assert_eq!(payload.outcome.kind, OutcomeKind::InsufficientFunds);
    assert_eq!(payload.outcome.new_balance, 10);

    // Stock untouched: funds are checked before anything is applied
    let vendor = world.ledger.get_vendor(&vendor_id).await.unwrap();
    assert_eq!(vendor.find_item(&item_id).unwrap().quantity, Stock::Count(4));
}

#[tokio::test]
async fn sell_pays_out_the_configured_percentage() {
    let world = world().await;
    world
        .ledger
        .settings()
        .set_automatic_sell_percentage(50)
        .await
        .unwrap();
    world.ledger.set_balance("peer-1", 0).await.unwrap();
    world
        .inventory
        .seed_actor(
            "peer-1",
            vec![ItemHandle {
                id: "rope-1".to_string(),
                name: "Rope".to_string(),
                count: 5,
                cost: 1.0,
                weight: 3.0,
            }],
        )
        .await;

    let mut sub = world.bus.subscribe();
    world
        .handle
        .sell(TransactionRequest {
            requesting_peer_id: "peer-1".to_string(),
            target_inventory_id: "peer-1".to_string(),
            vendor_id: None,
            lines: vec![line("rope-1", "Rope", 4, 1.0)],
        })
        .await
        .unwrap();

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "SellCompleted");
    // 4 display units at 50% → 2 base units
    assert_eq!(payload.outcome.affected_amount, 2);
    assert_eq!(payload.outcome.new_balance, 2);

    let carried = world.inventory.items("peer-1").await.unwrap();
    assert_eq!(carried[0].count, 1);
}

#[tokio::test]
async fn sell_fails_for_items_not_carried() {
    let world = world().await;
    world.ledger.set_balance("peer-1", 0).await.unwrap();
    world.inventory.ensure_actor("peer-1").await;

    let mut sub = world.bus.subscribe();
    world
        .handle
        .sell(TransactionRequest {
            requesting_peer_id: "peer-1".to_string(),
            target_inventory_id: "peer-1".to_string(),
            vendor_id: None,
            lines: vec![line("ghost", "Rope", 1, 1.0)],
        })
        .await
        .unwrap();

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "SellFailed");
    assert_eq!(payload.outcome.kind, OutcomeKind::InsufficientStock);
}

#[tokio::test]
async fn declined_approval_changes_nothing() {
    let world = world_with_gate(Arc::new(DecliningGate), true).await;
    let (vendor_id, item_id) = lantern_vendor(&world, Stock::Count(4)).await;
    world.ledger.set_balance("peer-1", 930).await.unwrap();
    world.inventory.ensure_actor("peer-1").await;

    let mut sub = world.bus.subscribe();
    world
        .handle
        .purchase(purchase(
            "peer-1",
            &vendor_id,
            vec![line(&item_id, "Lantern", 1, 12.0)],
        ))
        .await
        .unwrap();

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "PurchaseFailed");
    assert_eq!(payload.outcome.kind, OutcomeKind::Declined);

    let vendor = world.ledger.get_vendor(&vendor_id).await.unwrap();
    assert_eq!(vendor.find_item(&item_id).unwrap().quantity, Stock::Count(4));
    assert_eq!(world.ledger.get_balance("peer-1").await.unwrap(), 930);
}

#[tokio::test]
async fn approved_purchase_charges_full_price() {
    // The gate's percentage discounts sale payouts, never purchases.
    let world = world_with_gate(Arc::new(AutoApprovalGate::with_percentage(50)), true).await;
    let (vendor_id, item_id) = lantern_vendor(&world, Stock::Count(4)).await;
    world.ledger.set_balance("peer-1", 100).await.unwrap();
    world.inventory.ensure_actor("peer-1").await;

    let mut sub = world.bus.subscribe();
    world
        .handle
        .purchase(purchase(
            "peer-1",
            &vendor_id,
            vec![line(&item_id, "Lantern", 1, 12.0)],
        ))
        .await
        .unwrap();

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "PurchaseCompleted");
    assert_eq!(payload.outcome.affected_amount, 12);
    assert_eq!(payload.outcome.new_balance, 88);
}

#[tokio::test]
async fn failed_delivery_restores_depleted_stock() {
    let world = world().await;
    let (vendor_id, item_id) = lantern_vendor(&world, Stock::Count(2)).await;
    world.ledger.set_balance("peer-1", 930).await.unwrap();
    // The target inventory is never registered, so delivery fails after
    // the stock was already taken (and the item removed at depletion).

    let mut sub = world.bus.subscribe();
    world
        .handle
        .purchase(purchase(
            "peer-1",
            &vendor_id,
            vec![line(&item_id, "Lantern", 2, 12.0)],
        ))
        .await
        .unwrap();

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "PurchaseFailed");
    assert_eq!(payload.outcome.kind, OutcomeKind::InsufficientStock);
    assert_eq!(world.ledger.get_balance("peer-1").await.unwrap(), 930);

    // The item is back on the vendor with its full stock
    let vendor = world.ledger.get_vendor(&vendor_id).await.unwrap();
    assert_eq!(vendor.find_item(&item_id).unwrap().quantity, Stock::Count(2));
}

#[tokio::test]
async fn derived_sell_mints_coin_stacks_for_the_payout() {
    let world = world().await;
    world
        .ledger
        .settings()
        .set_managed_wallets(false)
        .await
        .unwrap();
    world
        .ledger
        .settings()
        .set_automatic_sell_percentage(50)
        .await
        .unwrap();
    // The peer carries the goods and a Silver stack only: the Gold and
    // Copper of the payout need stacks minted for them.
    world
        .inventory
        .seed_actor(
            "peer-1",
            vec![
                ItemHandle {
                    id: "rope-1".to_string(),
                    name: "Rope".to_string(),
                    count: 1,
                    cost: 170.0,
                    weight: 3.0,
                },
                ItemHandle {
                    id: "s".to_string(),
                    name: "Silver".to_string(),
                    count: 2,
                    cost: 0.2,
                    weight: 0.01,
                },
            ],
        )
        .await;

    let mut sub = world.bus.subscribe();
    world
        .handle
        .sell(TransactionRequest {
            requesting_peer_id: "peer-1".to_string(),
            target_inventory_id: "peer-1".to_string(),
            vendor_id: None,
            lines: vec![line("rope-1", "Rope", 1, 170.0)],
        })
        .await
        .unwrap();

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "SellCompleted");
    // 170 at 50% → 85 = 1 Gold + 1 Silver + 1 Copper
    assert_eq!(payload.outcome.affected_amount, 85);
    assert_eq!(payload.outcome.new_balance, 93);

    let carried = world.inventory.items("peer-1").await.unwrap();
    assert!(carried.iter().all(|i| i.name != "Rope"));
    assert_eq!(carried.iter().find(|i| i.name == "Gold").unwrap().count, 1);
    assert_eq!(carried.iter().find(|i| i.name == "Silver").unwrap().count, 3);
    assert_eq!(carried.iter().find(|i| i.name == "Copper").unwrap().count, 1);
}

#[tokio::test]
async fn duplicate_vendor_updates_leave_state_unchanged() {
    let world = world().await;
    let (vendor_id, item_id) = lantern_vendor(&world, Stock::Count(4)).await;
    world.ledger.set_balance("peer-1", 100).await.unwrap();
    world.inventory.ensure_actor("peer-1").await;

    let mut sub = world.bus.subscribe();
    // Re-delivered cache invalidations are no-ops on the authority
    for _ in 0..3 {
        world
            .bus
            .publish(TradeMessage::VendorUpdated(VendorUpdatedPayload {
                vendor_id: vendor_id.clone(),
            }));
    }

    world
        .handle
        .purchase(purchase(
            "peer-1",
            &vendor_id,
            vec![line(&item_id, "Lantern", 1, 12.0)],
        ))
        .await
        .unwrap();

    let (tag, payload) = outcome(&mut sub, "peer-1").await;
    assert_eq!(tag, "PurchaseCompleted");
    assert_eq!(payload.outcome.affected_amount, 12);
    assert_eq!(payload.outcome.new_balance, 88);

    let vendor = world.ledger.get_vendor(&vendor_id).await.unwrap();
    assert_eq!(vendor.find_item(&item_id).unwrap().quantity, Stock::Count(3));
}

#[tokio::test]
async fn concurrent_purchases_on_separate_vendors_stay_sold() {
    let world = world().await;
    let (vendor_a, item_a) = lantern_vendor(&world, Stock::Count(2)).await;
    let (vendor_b, item_b) = lantern_vendor(&world, Stock::Count(2)).await;
    world.ledger.set_balance("peer-a", 100).await.unwrap();
    world.ledger.set_balance("peer-b", 100).await.unwrap();
    world.inventory.ensure_actor("peer-a").await;
    world.inventory.ensure_actor("peer-b").await;

    let mut sub_a = world.bus.subscribe();
    let mut sub_b = world.bus.subscribe();

    // Distinct vendors and distinct wallets: the requests interleave
    // freely, yet neither write may resurrect the other's sold stock.
    world
        .handle
        .purchase(purchase(
            "peer-a",
            &vendor_a,
            vec![line(&item_a, "Lantern", 2, 12.0)],
        ))
        .await
        .unwrap();
    world
        .handle
        .purchase(purchase(
            "peer-b",
            &vendor_b,
            vec![line(&item_b, "Lantern", 2, 12.0)],
        ))
        .await
        .unwrap();

    let (tag_a, payload_a) = outcome(&mut sub_a, "peer-a").await;
    let (tag_b, payload_b) = outcome(&mut sub_b, "peer-b").await;
    assert_eq!(tag_a, "PurchaseCompleted");
    assert_eq!(tag_b, "PurchaseCompleted");
    assert_eq!(payload_a.outcome.new_balance, 76);
    assert_eq!(payload_b.outcome.new_balance, 76);

    // Both items drained to zero and left their vendors for good
    let a = world.ledger.get_vendor(&vendor_a).await.unwrap();
    let b = world.ledger.get_vendor(&vendor_b).await.unwrap();
    assert!(a.find_item(&item_a).is_none());
    assert!(b.find_item(&item_b).is_none());
}

#[tokio::test]
async fn concurrent_purchases_of_last_unit_settle_exactly_once() {
    let world = world().await;
    let (vendor_id, item_id) = lantern_vendor(&world, Stock::Count(1)).await;
    world.ledger.set_balance("peer-a", 100).await.unwrap();
    world.ledger.set_balance("peer-b", 100).await.unwrap();
    world.inventory.ensure_actor("peer-a").await;
    world.inventory.ensure_actor("peer-b").await;

    let mut sub_a = world.bus.subscribe();
    let mut sub_b = world.bus.subscribe();

    world
        .handle
        .purchase(purchase(
            "peer-a",
            &vendor_id,
            vec![line(&item_id, "Lantern", 1, 12.0)],
        ))
        .await
        .unwrap();
    world
        .handle
        .purchase(purchase(
            "peer-b",
            &vendor_id,
            vec![line(&item_id, "Lantern", 1, 12.0)],
        ))
        .await
        .unwrap();

    let (tag_a, payload_a) = outcome(&mut sub_a, "peer-a").await;
    let (tag_b, payload_b) = outcome(&mut sub_b, "peer-b").await;

    let successes = [tag_a, tag_b]
        .iter()
        .filter(|t| **t == "PurchaseCompleted")
        .count();
    assert_eq!(successes, 1, "exactly one purchase may win the last unit");

    let (winner, loser) = if tag_a == "PurchaseCompleted" {
        (payload_a, payload_b)
    } else {
        (payload_b, payload_a)
    };
    assert_eq!(winner.outcome.affected_amount, 12);
    assert_eq!(winner.outcome.new_balance, 88);
    assert_eq!(loser.outcome.kind, OutcomeKind::InsufficientStock);
    assert_eq!(loser.outcome.new_balance, 100);

    // The depleted item left the vendor entirely
    let vendor = world.ledger.get_vendor(&vendor_id).await.unwrap();
    assert!(vendor.find_item(&item_id).is_none());
}
