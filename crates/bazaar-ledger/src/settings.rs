//! # World Settings
//!
//! The world-scoped key/value settings store and its typed accessors.
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Settings Access                                   │
//! │                                                                         │
//! │  LedgerStore / Coordinator                                             │
//! │       │ typed reads/writes (DenominationSet, vendor map, flags)        │
//! │       ▼                                                                 │
//! │  WorldSettings ← JSON (de)serialization + defaults                     │
//! │       │ raw get/set/subscribe                                          │
//! │       ▼                                                                 │
//! │  dyn SettingsStore ← MemorySettings or SqliteSettings                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation is broadcast as a [`SettingChange`] so caches held by
//! peers can be invalidated.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bazaar_core::{DenominationSet, VendorRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{LedgerError, LedgerResult};

// =============================================================================
// Setting Keys
// =============================================================================

/// Map of vendor id → [`VendorRecord`].
pub const KEY_VENDORS: &str = "vendors";

/// Ordered denomination list (validated on read).
pub const KEY_DENOMINATIONS: &str = "currency_denominations";

/// Whether balances are authority-managed scalars.
pub const KEY_MANAGED_WALLETS: &str = "managed_wallets";

/// Map of peer id → scalar balance in base units (managed mode only).
pub const KEY_WALLET_BALANCES: &str = "wallet_balances";

/// Whether purchase/sell requests wait on the approval gate.
pub const KEY_REQUIRE_APPROVAL: &str = "require_approval";

/// Percentage of item value paid out on automatic sales (0–100).
pub const KEY_SELL_PERCENTAGE: &str = "automatic_sell_percentage";

// =============================================================================
// Settings Store Trait
// =============================================================================

/// A key change notification.
#[derive(Debug, Clone)]
pub struct SettingChange {
    /// The key that was written.
    pub key: String,
    /// The new value.
    pub value: Value,
}

/// Raw world-scoped key/value storage.
///
/// Values are opaque JSON; typing lives in [`WorldSettings`]. Backends
/// must broadcast a [`SettingChange`] after every successful `set`.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads a key; `None` when never written.
    async fn get(&self, key: &str) -> LedgerResult<Option<Value>>;

    /// Writes a key and broadcasts the change.
    async fn set(&self, key: &str, value: Value) -> LedgerResult<()>;

    /// Subscribes to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<SettingChange>;
}

// =============================================================================
// Typed Accessors
// =============================================================================

/// Typed view over a [`SettingsStore`].
///
/// Reads apply defaults when a key is absent; writes serialize through
/// serde so malformed state cannot be persisted.
#[derive(Clone)]
pub struct WorldSettings {
    store: Arc<dyn SettingsStore>,
}

impl WorldSettings {
    /// Wraps a raw store.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        WorldSettings { store }
    }

    /// The underlying raw store.
    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// Subscribes to raw change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.store.subscribe()
    }

    /// Reads and deserializes a key, falling back to `default` when
    /// absent.
    async fn get_or<T, F>(&self, key: &str, default: F) -> LedgerResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.store.get(key).await? {
            Some(value) => serde_json::from_value(value).map_err(|source| {
                LedgerError::SerializationFailed {
                    key: key.to_string(),
                    source,
                }
            }),
            None => Ok(default()),
        }
    }

    /// Serializes and writes a key.
    async fn put<T: Serialize>(&self, key: &str, value: &T) -> LedgerResult<()> {
        let json = serde_json::to_value(value).map_err(|source| {
            LedgerError::SerializationFailed {
                key: key.to_string(),
                source,
            }
        })?;
        self.store.set(key, json).await
    }

    /// The configured denomination set (standard Gold/Silver/Copper
    /// when unset). Validation happens during deserialization.
    pub async fn denominations(&self) -> LedgerResult<DenominationSet> {
        self.get_or(KEY_DENOMINATIONS, DenominationSet::standard)
            .await
    }

    /// Replaces the denomination configuration.
    pub async fn set_denominations(&self, denoms: &DenominationSet) -> LedgerResult<()> {
        self.put(KEY_DENOMINATIONS, denoms).await
    }

    /// The vendor map (empty when unset).
    pub async fn vendors(&self) -> LedgerResult<HashMap<String, VendorRecord>> {
        self.get_or(KEY_VENDORS, HashMap::new).await
    }

    /// Replaces the vendor map.
    pub async fn set_vendors(&self, vendors: &HashMap<String, VendorRecord>) -> LedgerResult<()> {
        self.put(KEY_VENDORS, vendors).await
    }

    /// Whether balances are authority-managed scalars. Default: true.
    pub async fn managed_wallets(&self) -> LedgerResult<bool> {
        self.get_or(KEY_MANAGED_WALLETS, || true).await
    }

    /// Sets the balance mode.
    pub async fn set_managed_wallets(&self, managed: bool) -> LedgerResult<()> {
        self.put(KEY_MANAGED_WALLETS, &managed).await
    }

    /// Scalar balances per peer (managed mode; empty when unset).
    pub async fn wallet_balances(&self) -> LedgerResult<HashMap<String, i64>> {
        self.get_or(KEY_WALLET_BALANCES, HashMap::new).await
    }

    /// Replaces the scalar balance map.
    pub async fn set_wallet_balances(&self, balances: &HashMap<String, i64>) -> LedgerResult<()> {
        self.put(KEY_WALLET_BALANCES, balances).await
    }

    /// Whether requests wait on the approval gate. Default: false.
    pub async fn require_approval(&self) -> LedgerResult<bool> {
        self.get_or(KEY_REQUIRE_APPROVAL, || false).await
    }

    /// Sets the approval flag.
    pub async fn set_require_approval(&self, required: bool) -> LedgerResult<()> {
        self.put(KEY_REQUIRE_APPROVAL, &required).await
    }

    /// Automatic sale payout percentage, clamped to 0–100. Default: 50.
    pub async fn automatic_sell_percentage(&self) -> LedgerResult<u8> {
        let raw: i64 = self.get_or(KEY_SELL_PERCENTAGE, || 50).await?;
        Ok(raw.clamp(0, 100) as u8)
    }

    /// Sets the automatic sale payout percentage.
    pub async fn set_automatic_sell_percentage(&self, percentage: u8) -> LedgerResult<()> {
        self.put(KEY_SELL_PERCENTAGE, &(percentage.min(100) as i64))
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySettings;

    fn settings() -> WorldSettings {
        WorldSettings::new(Arc::new(MemorySettings::new()))
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let settings = settings();
        assert!(settings.managed_wallets().await.unwrap());
        assert!(!settings.require_approval().await.unwrap());
        assert_eq!(settings.automatic_sell_percentage().await.unwrap(), 50);
        assert_eq!(
            settings.denominations().await.unwrap(),
            DenominationSet::standard()
        );
        assert!(settings.vendors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_trips_typed_values() {
        let settings = settings();

        settings.set_managed_wallets(false).await.unwrap();
        assert!(!settings.managed_wallets().await.unwrap());

        settings.set_automatic_sell_percentage(75).await.unwrap();
        assert_eq!(settings.automatic_sell_percentage().await.unwrap(), 75);

        let mut balances = HashMap::new();
        balances.insert("peer-1".to_string(), 930i64);
        settings.set_wallet_balances(&balances).await.unwrap();
        assert_eq!(
            settings.wallet_balances().await.unwrap().get("peer-1"),
            Some(&930)
        );
    }

    #[tokio::test]
    async fn test_sell_percentage_clamped() {
        let settings = settings();
        settings
            .store()
            .set(KEY_SELL_PERCENTAGE, serde_json::json!(250))
            .await
            .unwrap();
        assert_eq!(settings.automatic_sell_percentage().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_malformed_value_surfaces_error() {
        let settings = settings();
        settings
            .store()
            .set(KEY_DENOMINATIONS, serde_json::json!("not a list"))
            .await
            .unwrap();
        assert!(matches!(
            settings.denominations().await,
            Err(LedgerError::SerializationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_change_broadcast() {
        let settings = settings();
        let mut rx = settings.subscribe();
        settings.set_require_approval(true).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.key, KEY_REQUIRE_APPROVAL);
        assert_eq!(change.value, serde_json::json!(true));
    }
}
