//! # Transaction Coordinator
//!
//! The authoritative state machine that turns purchase and sell
//! requests into ledger writes and outcome messages.
//!
//! ## Purchase Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Purchase Request Lifecycle                         │
//! │                                                                         │
//! │  PlayerPurchaseRequest                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. acquire locks ["vendor:<id>", "wallet:<peer>"] (sorted order)      │
//! │  2. load vendor, validate each line against stock                      │
//! │       │  every line rejected ──► failed-insufficient-stock             │
//! │       ▼                                                                 │
//! │  3. total = Σ line values, rounded UP to the smallest unit             │
//! │  4. approval gate (only when require_approval)                         │
//! │       │  declined ──► declined                                         │
//! │       ▼                                                                 │
//! │  5. funds check on the WHOLE remaining request                         │
//! │       │  short ──► failed-insufficient-funds                           │
//! │       ▼                                                                 │
//! │  6. apply line by line: stock down, goods delivered, ItemPurchased     │
//! │       │  a line that fails here is skipped and logged                  │
//! │       ▼                                                                 │
//! │  7. settle: charge only what was actually applied                      │
//! │  8. PurchaseCompleted { userId, outcome }                              │
//! │                                                                         │
//! │  Locks are held from step 1 through step 7: two single-unit requests   │
//! │  against a stock of 1 cannot both pass validation.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sales mirror the flow without a vendor: holdings are validated
//! against the peer's own inventory and the payout is a configured
//! percentage of item value.
//!
//! Each request runs in its own spawned task, so an open approval
//! prompt suspends only that request.

use std::sync::Arc;

use bazaar_core::{
    OutcomeKind, RequestLine, Stock, TransactionOutcome, TransactionRequest, VendorItem,
};
use bazaar_ledger::{LedgerError, LedgerResult, LedgerStore};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::approval::{ApprovalDecision, ApprovalGate, TradeKind, TradeReview};
use crate::bridge::MessageBus;
use crate::error::{BrokerError, BrokerResult};
use crate::locks::ResourceLocks;
use crate::protocol::{ItemPurchasedPayload, OutcomePayload, TradeMessage};

/// Capacity of the command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Coordinator
// =============================================================================

/// Shared state for request handler tasks.
struct CoordinatorState {
    ledger: LedgerStore,
    bus: MessageBus,
    gate: Arc<dyn ApprovalGate>,
    locks: ResourceLocks,
}

/// The authoritative transaction coordinator.
///
/// Exactly one instance per world should run with `is_authority`; other
/// instances may subscribe to the bus for cache invalidation but must
/// not process requests.
pub struct TransactionCoordinator {
    state: Arc<CoordinatorState>,
    is_authority: bool,
}

/// Handle for controlling the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: mpsc::Sender<CoordinatorCommand>,
}

/// Commands for the coordinator.
#[derive(Debug)]
enum CoordinatorCommand {
    /// Process a purchase request injected directly.
    Purchase(TransactionRequest),
    /// Process a sell request injected directly.
    Sell(TransactionRequest),
    /// Shutdown the coordinator.
    Shutdown,
}

impl CoordinatorHandle {
    /// Injects a purchase request without going over the bus.
    pub async fn purchase(&self, request: TransactionRequest) -> BrokerResult<()> {
        self.cmd_tx
            .send(CoordinatorCommand::Purchase(request))
            .await
            .map_err(|_| BrokerError::ChannelError("Coordinator channel closed".into()))
    }

    /// Injects a sell request without going over the bus.
    pub async fn sell(&self, request: TransactionRequest) -> BrokerResult<()> {
        self.cmd_tx
            .send(CoordinatorCommand::Sell(request))
            .await
            .map_err(|_| BrokerError::ChannelError("Coordinator channel closed".into()))
    }

    /// Shuts down the coordinator loop. In-flight request tasks run to
    /// completion.
    pub async fn shutdown(&self) -> BrokerResult<()> {
        self.cmd_tx
            .send(CoordinatorCommand::Shutdown)
            .await
            .map_err(|_| BrokerError::ChannelError("Coordinator channel closed".into()))
    }
}

impl TransactionCoordinator {
    pub fn new(
        ledger: LedgerStore,
        bus: MessageBus,
        gate: Arc<dyn ApprovalGate>,
        is_authority: bool,
    ) -> Self {
        TransactionCoordinator {
            state: Arc::new(CoordinatorState {
                ledger,
                bus,
                gate,
                locks: ResourceLocks::new(),
            }),
            is_authority,
        }
    }

    /// Starts the coordinator and returns a handle.
    ///
    /// The bus subscription is taken before this returns, so requests
    /// published afterwards are never missed.
    pub fn start(self) -> CoordinatorHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let subscription = self.state.bus.subscribe();

        tokio::spawn(async move {
            self.run(cmd_rx, subscription).await;
        });

        CoordinatorHandle { cmd_tx }
    }

    /// Main coordinator loop: dispatches requests from the command
    /// channel and the bus into per-request tasks.
    async fn run(
        self,
        mut cmd_rx: mpsc::Receiver<CoordinatorCommand>,
        mut subscription: crate::bridge::BusSubscription,
    ) {
        info!(is_authority = self.is_authority, "Transaction coordinator started");

        loop {
            tokio::select! {
                Some(cmd) = cmd_rx.recv() => {
                    match cmd {
                        CoordinatorCommand::Shutdown => {
                            info!("Transaction coordinator shutting down");
                            break;
                        }
                        CoordinatorCommand::Purchase(request) => {
                            self.dispatch(TradeKind::Purchase, request);
                        }
                        CoordinatorCommand::Sell(request) => {
                            self.dispatch(TradeKind::Sell, request);
                        }
                    }
                }
                message = subscription.recv() => {
                    match message {
                        Ok(TradeMessage::PlayerPurchaseRequest(request)) => {
                            self.dispatch(TradeKind::Purchase, request);
                        }
                        Ok(TradeMessage::PlayerSellRequest(request)) => {
                            self.dispatch(TradeKind::Sell, request);
                        }
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
            }
        }
    }

    /// Spawns a handler task for one request.
    fn dispatch(&self, kind: TradeKind, request: TransactionRequest) {
        if !self.is_authority {
            return;
        }
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            match kind {
                TradeKind::Purchase => handle_purchase(state, request).await,
                TradeKind::Sell => handle_sell(state, request).await,
            }
        });
    }
}

// =============================================================================
// Percentage Scaling
// =============================================================================

/// Applies a sale percentage to a base-unit amount, rounding down.
/// Payouts never overpay.
fn scale_floor(base: i64, percentage: u8) -> i64 {
    base * percentage as i64 / 100
}

// =============================================================================
// Purchase Handling
// =============================================================================

/// A validated purchase line together with the vendor item frozen at
/// validation time, so a failed delivery can restore the stock even
/// when depletion already removed the item from the vendor.
struct ValidatedLine {
    line: RequestLine,
    item: VendorItem,
}

async fn handle_purchase(state: Arc<CoordinatorState>, request: TransactionRequest) {
    let peer_id = request.requesting_peer_id.clone();

    let Some(vendor_id) = request.vendor_id.clone() else {
        warn!(peer_id = %peer_id, "Purchase request without vendor id");
        publish_outcome(
            &state,
            TradeKind::Purchase,
            &peer_id,
            TransactionOutcome::failed(OutcomeKind::Declined, "No vendor specified", 0),
        );
        return;
    };

    let keys = [
        ResourceLocks::vendor_key(&vendor_id),
        ResourceLocks::wallet_key(&peer_id),
    ];
    let _guards = state.locks.acquire(&keys).await;

    let outcome = match purchase_locked(&state, &request, &vendor_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(peer_id = %peer_id, vendor_id = %vendor_id, error = %e, "Purchase failed internally");
            let balance = state.ledger.get_balance(&peer_id).await.unwrap_or(0);
            TransactionOutcome::failed(
                OutcomeKind::Declined,
                "The transaction could not be completed",
                balance,
            )
        }
    };

    info!(
        peer_id = %peer_id,
        vendor_id = %vendor_id,
        kind = %outcome.kind,
        affected = outcome.affected_amount,
        "Purchase settled"
    );
    publish_outcome(&state, TradeKind::Purchase, &peer_id, outcome);
}

/// Steps 2–7 of the purchase flow, with the resource locks held.
async fn purchase_locked(
    state: &CoordinatorState,
    request: &TransactionRequest,
    vendor_id: &str,
) -> BrokerResult<TransactionOutcome> {
    let peer_id = &request.requesting_peer_id;
    let ledger = &state.ledger;
    let denoms = ledger.denominations().await?;
    let balance = ledger.get_balance(peer_id).await?;

    let vendor = match ledger.get_vendor(vendor_id).await {
        Ok(vendor) if vendor.active => vendor,
        Ok(_) | Err(LedgerError::VendorNotFound { .. }) => {
            return Ok(TransactionOutcome::failed(
                OutcomeKind::Declined,
                "Vendor is not available",
                balance,
            ));
        }
        Err(e) => return Err(e.into()),
    };

    // Per-line stock validation: rejected lines are collected, the
    // rest of the request keeps going.
    let mut validated: Vec<ValidatedLine> = Vec::new();
    let mut rejected: Vec<String> = Vec::new();
    for line in &request.lines {
        match vendor.find_item(&line.item_id) {
            Some(item) if line.quantity > 0 && item.quantity.covers(line.quantity) => {
                validated.push(ValidatedLine {
                    line: line.clone(),
                    item: item.clone(),
                });
            }
            _ => rejected.push(line.name.clone()),
        }
    }
    if validated.is_empty() {
        return Ok(TransactionOutcome::failed(
            OutcomeKind::InsufficientStock,
            format!("Out of stock: {}", rejected.join(", ")),
            balance,
        ));
    }

    let total_display: f64 = validated.iter().map(|v| v.line.line_value()).sum();

    // The gate is only consulted when the world requires approval. An
    // approved purchase is charged at full value; the gate's percentage
    // applies to sale payouts only.
    if ledger.settings().require_approval().await? {
        let review = TradeReview {
            kind: TradeKind::Purchase,
            peer_id: peer_id.clone(),
            vendor_id: Some(vendor_id.to_string()),
            lines: validated.iter().map(|v| v.line.clone()).collect(),
            total_display,
        };
        if let ApprovalDecision::Declined = state.gate.review(review).await {
            return Ok(TransactionOutcome::failed(
                OutcomeKind::Declined,
                "Purchase declined",
                balance,
            ));
        }
    }

    // Funds are checked against the whole remaining request before
    // anything is applied.
    let charge = denoms.to_base_ceil(total_display);
    if balance < charge {
        return Ok(TransactionOutcome::failed(
            OutcomeKind::InsufficientFunds,
            format!(
                "Insufficient funds: need {}, have {}",
                denoms.to_display(charge),
                denoms.to_display(balance)
            ),
            balance,
        ));
    }

    // Apply line by line. A line that fails here is skipped and
    // logged; its value is excluded from settlement.
    let mut applied_display = 0.0f64;
    let mut applied_count = 0usize;
    for v in &validated {
        let line = &v.line;
        let remaining = match ledger.adjust_stock(vendor_id, &line.item_id, -line.quantity).await {
            Ok(remaining) => remaining,
            Err(e) => {
                warn!(item_id = %line.item_id, error = %e, "Stock adjust failed, line skipped");
                rejected.push(line.name.clone());
                continue;
            }
        };

        if let Err(e) = ledger
            .add_inventory_item(
                &request.target_inventory_id,
                &line.name,
                line.quantity,
                line.unit_price,
                v.item.weight,
            )
            .await
        {
            // Undo the stock take so the goods are not lost.
            warn!(item_id = %line.item_id, error = %e, "Delivery failed, line skipped");
            if let Err(e) = restore_stock(ledger, vendor_id, &v.item, line.quantity).await {
                error!(item_id = %line.item_id, error = %e, "Stock restore failed, units lost");
            }
            rejected.push(line.name.clone());
            continue;
        }

        applied_display += line.line_value();
        applied_count += 1;
        state.bus.publish(TradeMessage::ItemPurchased(ItemPurchasedPayload {
            vendor_id: vendor_id.to_string(),
            item_id: line.item_id.clone(),
            quantity: line.quantity,
            remaining,
        }));
    }

    if applied_count == 0 {
        return Ok(TransactionOutcome::failed(
            OutcomeKind::InsufficientStock,
            "No items could be supplied",
            balance,
        ));
    }

    // Settle with what was actually applied.
    let charged = denoms.to_base_ceil(applied_display);
    let new_balance = ledger.set_balance(peer_id, balance - charged).await?;

    let mut message = format!(
        "Purchased {} item(s) for {}",
        applied_count,
        denoms.to_display(charged)
    );
    if !rejected.is_empty() {
        message.push_str(&format!("; unavailable: {}", rejected.join(", ")));
    }
    Ok(TransactionOutcome::completed(message, charged, new_balance))
}

/// Puts back units a failed delivery already took from the vendor.
///
/// A line that drained its stock removed the item from the vendor
/// entirely, so when the adjust misses, the item frozen at validation
/// is re-inserted holding the taken units.
async fn restore_stock(
    ledger: &LedgerStore,
    vendor_id: &str,
    item: &VendorItem,
    quantity: i64,
) -> LedgerResult<()> {
    match ledger.adjust_stock(vendor_id, &item.id, quantity).await {
        Ok(_) => Ok(()),
        Err(LedgerError::ItemNotFound { .. }) => {
            let mut vendor = ledger.get_vendor(vendor_id).await?;
            let mut restored = item.clone();
            restored.quantity = Stock::Count(quantity);
            vendor.items.push(restored);
            ledger.set_vendor(vendor).await
        }
        Err(e) => Err(e),
    }
}

// =============================================================================
// Sell Handling
// =============================================================================

async fn handle_sell(state: Arc<CoordinatorState>, request: TransactionRequest) {
    let peer_id = request.requesting_peer_id.clone();

    let keys = [
        ResourceLocks::wallet_key(&peer_id),
        ResourceLocks::wallet_key(&request.target_inventory_id),
    ];
    let _guards = state.locks.acquire(&keys).await;

    let outcome = match sell_locked(&state, &request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(peer_id = %peer_id, error = %e, "Sale failed internally");
            let balance = state.ledger.get_balance(&peer_id).await.unwrap_or(0);
            TransactionOutcome::failed(
                OutcomeKind::Declined,
                "The transaction could not be completed",
                balance,
            )
        }
    };

    info!(
        peer_id = %peer_id,
        kind = %outcome.kind,
        affected = outcome.affected_amount,
        "Sale settled"
    );
    publish_outcome(&state, TradeKind::Sell, &peer_id, outcome);
}

/// The sell counterpart of [`purchase_locked`].
async fn sell_locked(
    state: &CoordinatorState,
    request: &TransactionRequest,
) -> BrokerResult<TransactionOutcome> {
    let peer_id = &request.requesting_peer_id;
    let ledger = &state.ledger;
    let denoms = ledger.denominations().await?;
    let balance = ledger.get_balance(peer_id).await?;

    let carried = match ledger.inventory().items(&request.target_inventory_id).await {
        Ok(items) => items,
        Err(LedgerError::ActorNotFound { .. }) => {
            return Ok(TransactionOutcome::failed(
                OutcomeKind::Declined,
                "Inventory is not available",
                balance,
            ));
        }
        Err(e) => return Err(e.into()),
    };

    // Holdings validation mirrors the purchase stock check.
    let mut validated: Vec<RequestLine> = Vec::new();
    let mut rejected: Vec<String> = Vec::new();
    for line in &request.lines {
        match carried.iter().find(|item| item.id == line.item_id) {
            Some(item) if line.quantity > 0 && item.count >= line.quantity => {
                validated.push(line.clone());
            }
            _ => rejected.push(line.name.clone()),
        }
    }
    if validated.is_empty() {
        return Ok(TransactionOutcome::failed(
            OutcomeKind::InsufficientStock,
            format!("Not carried: {}", rejected.join(", ")),
            balance,
        ));
    }

    let total_display: f64 = validated.iter().map(|line| line.line_value()).sum();

    let percentage = if ledger.settings().require_approval().await? {
        let review = TradeReview {
            kind: TradeKind::Sell,
            peer_id: peer_id.clone(),
            vendor_id: None,
            lines: validated.clone(),
            total_display,
        };
        match state.gate.review(review).await {
            ApprovalDecision::Approved { percentage } => percentage,
            ApprovalDecision::Declined => {
                return Ok(TransactionOutcome::failed(
                    OutcomeKind::Declined,
                    "Sale declined",
                    balance,
                ));
            }
        }
    } else {
        ledger.settings().automatic_sell_percentage().await?
    };

    // Apply line by line; partially-removable lines pay out for what
    // was actually removed.
    let mut applied_display = 0.0f64;
    let mut applied_count = 0usize;
    for line in &validated {
        match ledger
            .remove_inventory_count(&request.target_inventory_id, &line.item_id, line.quantity)
            .await
        {
            Ok(removed) if removed > 0 => {
                applied_display += line.unit_price * removed as f64;
                applied_count += 1;
            }
            Ok(_) => rejected.push(line.name.clone()),
            Err(e) => {
                warn!(item_id = %line.item_id, error = %e, "Removal failed, line skipped");
                rejected.push(line.name.clone());
            }
        }
    }
    if applied_count == 0 {
        return Ok(TransactionOutcome::failed(
            OutcomeKind::InsufficientStock,
            "No items could be sold",
            balance,
        ));
    }

    let payout = scale_floor(denoms.to_base(applied_display), percentage);
    let new_balance = if ledger.settings().managed_wallets().await? {
        ledger.set_balance(peer_id, balance + payout).await?
    } else {
        // Physical coins: payout is added to the peer's coin items.
        ledger.credit_coins(peer_id, payout).await?
    };

    let mut message = format!(
        "Sold {} item(s) for {}",
        applied_count,
        denoms.to_display(payout)
    );
    if !rejected.is_empty() {
        message.push_str(&format!("; not sold: {}", rejected.join(", ")));
    }
    Ok(TransactionOutcome::completed(message, payout, new_balance))
}

// =============================================================================
// Outcome Publishing
// =============================================================================

/// Publishes the outcome message addressed to the requesting peer.
fn publish_outcome(
    state: &CoordinatorState,
    kind: TradeKind,
    peer_id: &str,
    outcome: TransactionOutcome,
) {
    let payload = OutcomePayload {
        user_id: peer_id.to_string(),
        outcome,
    };
    let message = match (kind, payload.outcome.success) {
        (TradeKind::Purchase, true) => TradeMessage::PurchaseCompleted(payload),
        (TradeKind::Purchase, false) => TradeMessage::PurchaseFailed(payload),
        (TradeKind::Sell, true) => TradeMessage::SellCompleted(payload),
        (TradeKind::Sell, false) => TradeMessage::SellFailed(payload),
    };
    state.bus.publish(message);
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_floor_never_overpays() {
        assert_eq!(scale_floor(100, 50), 50);
        assert_eq!(scale_floor(1, 50), 0); // half a unit rounds down
        assert_eq!(scale_floor(3, 50), 1);
        assert_eq!(scale_floor(4, 0), 0);
    }
}
