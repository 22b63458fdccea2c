//! # Per-Resource Locks
//!
//! Serializes coordinator work on the resources a request touches.
//!
//! ## Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Each vendor and each peer wallet is one logical resource:             │
//! │                                                                         │
//! │    "vendor:<vendor id>"                                                 │
//! │    "wallet:<peer id>"                                                   │
//! │                                                                         │
//! │  A request acquires every key it touches BEFORE validation and holds   │
//! │  the guards through settlement, so validate-then-apply is atomic per   │
//! │  resource: two single-unit purchases against stock 1 cannot both       │
//! │  pass validation.                                                      │
//! │                                                                         │
//! │  Keys are acquired in sorted order, which rules out lock-order         │
//! │  inversion between requests touching the same pair of resources.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A registry of named async locks.
///
/// Lock entries are created on first use and kept for the registry's
/// lifetime; the set of vendors and peers is small.
pub struct ResourceLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        ResourceLocks {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// The lock key for a vendor.
    pub fn vendor_key(vendor_id: &str) -> String {
        format!("vendor:{}", vendor_id)
    }

    /// The lock key for a peer's wallet.
    pub fn wallet_key(peer_id: &str) -> String {
        format!("wallet:{}", peer_id)
    }

    /// Acquires every named lock, in sorted key order, and returns the
    /// guards. Dropping the guards releases the locks.
    pub async fn acquire(&self, keys: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted: Vec<&String> = keys.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in sorted {
            let lock = {
                let mut map = self.inner.lock().await;
                Arc::clone(map.entry(key.clone()).or_default())
            };
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}

impl Default for ResourceLocks {
    fn default() -> Self {
        ResourceLocks::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
