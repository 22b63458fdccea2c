//! # Ledger Store
//!
//! The single authority-side surface for balances, vendors, and stock.
//!
//! ## Balance Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get_balance / set_balance resolve the source ONCE per call:           │
//! │                                                                         │
//! │  managed_wallets = true   →  Authoritative scalar                      │
//! │    balance lives in the wallet_balances settings map,                  │
//! │    writes clamp at zero                                                │
//! │                                                                         │
//! │  managed_wallets = false  →  Derived                                   │
//! │    balance is Σ count × base value over the peer's coin items;         │
//! │    decreases spend physical coins (exact counts preserved,            │
//! │    one larger coin broken when a denomination runs out);               │
//! │    increases have no item to credit and are rejected                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every successful vendor write is re-broadcast as a [`LedgerEvent`]
//! so peer-side caches can be invalidated.
//!
//! All vendors share one settings document and all managed balances
//! another, so the store serializes the read-modify-write cycle on each
//! of those documents internally; otherwise two writers touching
//! different vendors (or different peers) would clobber each other's
//! entry. Callers still serialize whole transactions per resource.

use std::collections::HashMap;
use std::sync::Arc;

use bazaar_core::{
    make_change, value_of, DenominationSet, Stock, VendorRecord, Wallet, WalletPolicy,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::documents::{CurrencyItemMatcher, InventoryDocuments, ItemHandle, ItemPatch};
use crate::error::{LedgerError, LedgerResult};
use crate::settings::WorldSettings;

/// Capacity of the ledger event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Ledger Events
// =============================================================================

/// State-change notifications emitted after successful writes.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    /// A vendor was created or modified.
    VendorUpdated { vendor: VendorRecord },
    /// A vendor was removed.
    VendorRemoved { vendor_id: String },
    /// A peer's balance changed.
    BalanceChanged { peer_id: String, new_balance: i64 },
}

// =============================================================================
// Ledger Store
// =============================================================================

/// One mutex per shared settings document.
#[derive(Default)]
struct DocumentLocks {
    vendors: Mutex<()>,
    balances: Mutex<()>,
}

/// Authority-side access to balances, vendors, and inventories.
#[derive(Clone)]
pub struct LedgerStore {
    settings: WorldSettings,
    inventory: Arc<dyn InventoryDocuments>,
    events: broadcast::Sender<LedgerEvent>,
    write_locks: Arc<DocumentLocks>,
}

impl LedgerStore {
    pub fn new(settings: WorldSettings, inventory: Arc<dyn InventoryDocuments>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        LedgerStore {
            settings,
            inventory,
            events,
            write_locks: Arc::new(DocumentLocks::default()),
        }
    }

    /// Subscribes to state-change events.
    pub fn events(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// The typed settings view.
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// The inventory backend.
    pub fn inventory(&self) -> &Arc<dyn InventoryDocuments> {
        &self.inventory
    }

    /// The configured denomination set.
    pub async fn denominations(&self) -> LedgerResult<DenominationSet> {
        self.settings.denominations().await
    }

    fn emit(&self, event: LedgerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// A peer's balance in base units.
    pub async fn get_balance(&self, peer_id: &str) -> LedgerResult<i64> {
        if self.settings.managed_wallets().await? {
            let balances = self.settings.wallet_balances().await?;
            Ok(balances.get(peer_id).copied().unwrap_or(0))
        } else {
            let denoms = self.settings.denominations().await?;
            let items = self.inventory.items(peer_id).await?;
            let bag = CurrencyItemMatcher::new(&denoms).coin_bag(&items);
            Ok(value_of(&bag, &denoms)?)
        }
    }

    /// Sets a peer's balance in base units.
    ///
    /// Authoritative balances clamp at zero. Derived balances can only
    /// decrease (coins are spent); an increase has no item to credit
    /// and fails with `UnsupportedOperation`.
    pub async fn set_balance(&self, peer_id: &str, new_balance: i64) -> LedgerResult<i64> {
        let applied = if self.settings.managed_wallets().await? {
            let clamped = new_balance.max(0);
            // Every managed balance lives in one document; hold the
            // document lock across the read-modify-write.
            let _guard = self.write_locks.balances.lock().await;
            let mut balances = self.settings.wallet_balances().await?;
            balances.insert(peer_id.to_string(), clamped);
            self.settings.set_wallet_balances(&balances).await?;
            clamped
        } else {
            self.set_derived_balance(peer_id, new_balance).await?
        };

        debug!(peer_id = %peer_id, new_balance = applied, "Balance updated");
        self.emit(LedgerEvent::BalanceChanged {
            peer_id: peer_id.to_string(),
            new_balance: applied,
        });
        Ok(applied)
    }

    /// Decreases a derived balance by spending physical coins.
    async fn set_derived_balance(&self, peer_id: &str, new_balance: i64) -> LedgerResult<i64> {
        let denoms = self.settings.denominations().await?;
        let items = self.inventory.items(peer_id).await?;
        let matcher = CurrencyItemMatcher::new(&denoms);

        let bag = matcher.coin_bag(&items);
        let current = value_of(&bag, &denoms)?;
        if new_balance == current {
            return Ok(current);
        }
        if new_balance > current {
            return Err(LedgerError::UnsupportedOperation(format!(
                "cannot raise derived balance of {} from {} to {}: no coin item to credit",
                peer_id, current, new_balance
            )));
        }

        // Exact counts preserved: the peer keeps the coins they carry,
        // minus what the spend consumed.
        let mut wallet = Wallet::new(&bag, WalletPolicy::preserve_exact(), &denoms)?;
        wallet.subtract(current - new_balance)?;

        // Plan every write before touching the backend, so a missing
        // template item fails the whole operation cleanly.
        let grouped = matcher.matches(&items);
        let mut patches: Vec<(String, i64)> = Vec::new();
        let mut deletions: Vec<String> = Vec::new();
        for (idx, stacks) in grouped.iter().enumerate() {
            let desired = wallet.counts()[idx];
            match stacks.first() {
                Some(first) => {
                    patches.push((first.id.clone(), desired));
                    deletions.extend(stacks.iter().skip(1).map(|s| s.id.clone()));
                }
                None if desired > 0 => {
                    return Err(LedgerError::UnsupportedOperation(format!(
                        "{} has no {} item to hold {} coins",
                        peer_id,
                        denoms.denominations()[idx].name,
                        desired
                    )));
                }
                None => {}
            }
        }

        for (item_id, count) in patches {
            self.inventory
                .patch_item(peer_id, &item_id, ItemPatch::count(count))
                .await?;
        }
        for item_id in deletions {
            self.inventory.delete_item(peer_id, &item_id).await?;
        }

        Ok(wallet.total())
    }

    // =========================================================================
    // Vendors
    // =========================================================================

    /// All vendors.
    pub async fn vendors(&self) -> LedgerResult<HashMap<String, VendorRecord>> {
        self.settings.vendors().await
    }

    /// One vendor by id.
    pub async fn get_vendor(&self, vendor_id: &str) -> LedgerResult<VendorRecord> {
        self.settings
            .vendors()
            .await?
            .remove(vendor_id)
            .ok_or_else(|| LedgerError::VendorNotFound {
                vendor_id: vendor_id.to_string(),
            })
    }

    /// Creates or replaces a vendor and broadcasts the update.
    pub async fn set_vendor(&self, mut vendor: VendorRecord) -> LedgerResult<()> {
        vendor.touch();
        {
            let _guard = self.write_locks.vendors.lock().await;
            let mut vendors = self.settings.vendors().await?;
            vendors.insert(vendor.id.clone(), vendor.clone());
            self.settings.set_vendors(&vendors).await?;
        }

        info!(vendor_id = %vendor.id, name = %vendor.name, "Vendor written");
        self.emit(LedgerEvent::VendorUpdated { vendor });
        Ok(())
    }

    /// Removes a vendor and broadcasts the removal.
    pub async fn remove_vendor(&self, vendor_id: &str) -> LedgerResult<()> {
        {
            let _guard = self.write_locks.vendors.lock().await;
            let mut vendors = self.settings.vendors().await?;
            if vendors.remove(vendor_id).is_none() {
                return Err(LedgerError::VendorNotFound {
                    vendor_id: vendor_id.to_string(),
                });
            }
            self.settings.set_vendors(&vendors).await?;
        }

        info!(vendor_id = %vendor_id, "Vendor removed");
        self.emit(LedgerEvent::VendorRemoved {
            vendor_id: vendor_id.to_string(),
        });
        Ok(())
    }

    /// Adjusts a vendor item's stock by `delta`, returning the new
    /// stock level.
    ///
    /// Bounded stock clamps at zero and the item is removed from the
    /// vendor once depleted; unlimited stock is unchanged. The vendor
    /// is persisted and re-broadcast on every call.
    pub async fn adjust_stock(
        &self,
        vendor_id: &str,
        item_id: &str,
        delta: i64,
    ) -> LedgerResult<Stock> {
        let mut vendor = self.get_vendor(vendor_id).await?;
        let item = vendor
            .find_item_mut(item_id)
            .ok_or_else(|| LedgerError::ItemNotFound {
                item_id: item_id.to_string(),
            })?;

        let next = item.quantity.adjusted(delta);
        item.quantity = next;
        if next.is_depleted() {
            vendor.items.retain(|item| item.id != item_id);
            debug!(vendor_id = %vendor_id, item_id = %item_id, "Item depleted, removed");
        }

        self.set_vendor(vendor).await?;
        Ok(next)
    }

    // =========================================================================
    // Inventories
    // =========================================================================

    /// Delivers purchased goods: merges into an existing stack with the
    /// same name, or creates a new item.
    pub async fn add_inventory_item(
        &self,
        actor_id: &str,
        name: &str,
        quantity: i64,
        cost: f64,
        weight: f64,
    ) -> LedgerResult<()> {
        let items = self.inventory.items(actor_id).await?;
        match items.iter().find(|item| item.name == name) {
            Some(existing) => {
                self.inventory
                    .patch_item(
                        actor_id,
                        &existing.id,
                        ItemPatch::count(existing.count + quantity),
                    )
                    .await?;
            }
            None => {
                self.inventory
                    .create_item(
                        actor_id,
                        ItemHandle {
                            id: String::new(),
                            name: name.to_string(),
                            count: quantity,
                            cost,
                            weight,
                        },
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Removes up to `quantity` units of a carried item, deleting the
    /// document when its count reaches zero. Returns the number of
    /// units actually removed.
    pub async fn remove_inventory_count(
        &self,
        actor_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> LedgerResult<i64> {
        let items = self.inventory.items(actor_id).await?;
        let item = items
            .iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| LedgerError::ItemNotFound {
                item_id: item_id.to_string(),
            })?;

        let removed = quantity.min(item.count).max(0);
        let remaining = item.count - removed;
        if remaining == 0 {
            self.inventory.delete_item(actor_id, item_id).await?;
        } else {
            self.inventory
                .patch_item(actor_id, item_id, ItemPatch::count(remaining))
                .await?;
        }
        if removed < quantity {
            warn!(
                actor_id = %actor_id,
                item_id = %item_id,
                requested = quantity,
                removed,
                "Removed fewer units than requested"
            );
        }
        Ok(removed)
    }

    /// Pays out coins to a derived-balance peer by adding change to
    /// their coin items, minting a fresh stack for any denomination
    /// the peer does not yet carry. Sell settlement relies on this
    /// never failing for want of a stack: by the time it runs the
    /// goods have already been taken.
    pub async fn credit_coins(&self, peer_id: &str, amount: i64) -> LedgerResult<i64> {
        let denoms = self.settings.denominations().await?;
        let items = self.inventory.items(peer_id).await?;
        let matcher = CurrencyItemMatcher::new(&denoms);
        let grouped = matcher.matches(&items);

        let payout = make_change(amount.max(0), &denoms);
        for (idx, denom) in denoms.denominations().iter().enumerate() {
            let gained = payout.count(&denom.name);
            if gained == 0 {
                continue;
            }
            match grouped[idx].first() {
                Some(first) => {
                    self.inventory
                        .patch_item(peer_id, &first.id, ItemPatch::count(first.count + gained))
                        .await?;
                }
                None => {
                    self.inventory
                        .create_item(
                            peer_id,
                            ItemHandle {
                                id: String::new(),
                                name: denom.name.clone(),
                                count: gained,
                                cost: denom.value,
                                weight: denom.weight,
                            },
                        )
                        .await?;
                }
            }
        }

        let balance = self.get_balance(peer_id).await?;
        self.emit(LedgerEvent::BalanceChanged {
            peer_id: peer_id.to_string(),
            new_balance: balance,
        });
        Ok(balance)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
