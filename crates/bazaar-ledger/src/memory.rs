//! # In-Process Backends
//!
//! Map-backed implementations of [`SettingsStore`] and
//! [`InventoryDocuments`] for tests and single-process embeddings.
//! State lives behind a `tokio::sync::RwLock`; change notifications go
//! through the same broadcast channel the SQLite backend uses.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::documents::{InventoryDocuments, ItemHandle, ItemPatch};
use crate::error::{LedgerError, LedgerResult};
use crate::settings::{SettingChange, SettingsStore};

/// Capacity of the change broadcast channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Memory Settings
// =============================================================================

/// Map-backed settings store.
pub struct MemorySettings {
    values: RwLock<HashMap<String, Value>>,
    changes: broadcast::Sender<SettingChange>,
}

impl MemorySettings {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        MemorySettings {
            values: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        MemorySettings::new()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> LedgerResult<Option<Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> LedgerResult<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.clone());
        // No subscribers is fine
        let _ = self.changes.send(SettingChange {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }
}

// =============================================================================
// Memory Inventory
// =============================================================================

/// Map-backed inventory document store.
///
/// Actors must be registered with [`MemoryInventory::ensure_actor`]
/// (or implicitly via `create_item`) before their items can be read;
/// reading an unknown actor is `ActorNotFound`, matching how real
/// backends treat missing documents.
pub struct MemoryInventory {
    actors: RwLock<HashMap<String, Vec<ItemHandle>>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        MemoryInventory {
            actors: RwLock::new(HashMap::new()),
        }
    }

    /// Registers an actor with an empty inventory if absent.
    pub async fn ensure_actor(&self, actor_id: &str) {
        self.actors
            .write()
            .await
            .entry(actor_id.to_string())
            .or_default();
    }

    /// Registers an actor with the given starting items.
    pub async fn seed_actor(&self, actor_id: &str, items: Vec<ItemHandle>) {
        self.actors.write().await.insert(actor_id.to_string(), items);
    }
}

impl Default for MemoryInventory {
    fn default() -> Self {
        MemoryInventory::new()
    }
}

#[async_trait]
impl InventoryDocuments for MemoryInventory {
    async fn items(&self, actor_id: &str) -> LedgerResult<Vec<ItemHandle>> {
        self.actors
            .read()
            .await
            .get(actor_id)
            .cloned()
            .ok_or_else(|| LedgerError::ActorNotFound {
                actor_id: actor_id.to_string(),
            })
    }

    async fn patch_item(
        &self,
        actor_id: &str,
        item_id: &str,
        patch: ItemPatch,
    ) -> LedgerResult<()> {
        let mut actors = self.actors.write().await;
        let items = actors
            .get_mut(actor_id)
            .ok_or_else(|| LedgerError::ActorNotFound {
                actor_id: actor_id.to_string(),
            })?;
        let item = items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| LedgerError::ItemNotFound {
                item_id: item_id.to_string(),
            })?;
        if let Some(count) = patch.count {
            item.count = count;
        }
        if let Some(cost) = patch.cost {
            item.cost = cost;
        }
        Ok(())
    }

    async fn create_item(&self, actor_id: &str, mut item: ItemHandle) -> LedgerResult<String> {
        if item.id.is_empty() {
            item.id = Uuid::new_v4().to_string();
        }
        let id = item.id.clone();
        self.actors
            .write()
            .await
            .entry(actor_id.to_string())
            .or_default()
            .push(item);
        Ok(id)
    }

    async fn delete_item(&self, actor_id: &str, item_id: &str) -> LedgerResult<()> {
        let mut actors = self.actors.write().await;
        let items = actors
            .get_mut(actor_id)
            .ok_or_else(|| LedgerError::ActorNotFound {
                actor_id: actor_id.to_string(),
            })?;
        let before = items.len();
        items.retain(|item| item.id != item_id);
        if items.len() == before {
            return Err(LedgerError::ItemNotFound {
                item_id: item_id.to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(name: &str, count: i64) -> ItemHandle {
        ItemHandle {
            id: String::new(),
            name: name.to_string(),
            count,
            cost: 0.0,
            weight: 0.01,
        }
    }

    #[tokio::test]
    async fn test_unknown_actor_is_not_found() {
        let inventory = MemoryInventory::new();
        assert!(matches!(
            inventory.items("ghost").await,
            Err(LedgerError::ActorNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_item_lifecycle() {
        let inventory = MemoryInventory::new();
        let id = inventory.create_item("peer-1", coin("Gold", 3)).await.unwrap();

        let items = inventory.items("peer-1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].count, 3);

        inventory
            .patch_item("peer-1", &id, ItemPatch::count(7))
            .await
            .unwrap();
        assert_eq!(inventory.items("peer-1").await.unwrap()[0].count, 7);

        inventory.delete_item("peer-1", &id).await.unwrap();
        assert!(inventory.items("peer-1").await.unwrap().is_empty());

        assert!(matches!(
            inventory.delete_item("peer-1", &id).await,
            Err(LedgerError::ItemNotFound { .. })
        ));
    }
}
