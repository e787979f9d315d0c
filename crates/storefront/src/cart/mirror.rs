//! Durable local copy of the cart.
//!
//! Every mutation writes the full cart here regardless of mode. The mirror is
//! read back only at session start: as the primary store in local mode, or as
//! the fallback when the remote cart cannot be fetched.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mercadito_core::{CartLine, Product, RemoteLineId};

use super::store::CartStore;
use crate::storage::{LocalStorage, StorageError};

/// Storage key holding the cart snapshot.
pub const CART_KEY: &str = "cart";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartSnapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    items: Vec<SnapshotItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotItem {
    product: Product,
    quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_line_id: Option<RemoteLineId>,
}

/// Reads and writes cart snapshots in local storage.
#[derive(Clone)]
pub struct CartMirror {
    storage: Arc<dyn LocalStorage>,
}

impl CartMirror {
    /// Create a mirror over a storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    /// Write the full cart.
    ///
    /// Lines whose product data is unknown cannot be restored with a price,
    /// so they are skipped (and logged).
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized or persisted.
    pub fn save(&self, cart: &CartStore) -> Result<(), StorageError> {
        let items = cart
            .entries()
            .filter_map(|(line, product)| {
                let Some(product) = product else {
                    warn!(product_id = %line.product_id, "Skipping cart line without product data in mirror");
                    return None;
                };
                Some(SnapshotItem {
                    product: product.clone(),
                    quantity: line.quantity,
                    remote_line_id: line.remote_line_id.clone(),
                })
            })
            .collect();

        let snapshot = CartSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            items,
        };

        let json = serde_json::to_string(&snapshot)?;
        self.storage.set(CART_KEY, &json)?;
        debug!(lines = cart.lines().len(), "Cart mirror saved");
        Ok(())
    }

    /// Load the cart, treating missing or corrupt data as an empty cart.
    #[must_use]
    pub fn load(&self) -> CartStore {
        let raw = match self.storage.get(CART_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return CartStore::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read cart mirror, starting with an empty cart");
                return CartStore::new();
            }
        };

        match parse_snapshot(&raw) {
            Ok(cart) => cart,
            Err(reason) => {
                warn!(%reason, "Discarding corrupt cart mirror");
                CartStore::new()
            }
        }
    }

    /// Delete the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(CART_KEY)
    }
}

/// Parse and validate a snapshot payload.
fn parse_snapshot(raw: &str) -> Result<CartStore, String> {
    let snapshot: CartSnapshot =
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(format!("unsupported snapshot version {}", snapshot.version));
    }

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(snapshot.items.len());
    for item in snapshot.items {
        if item.quantity == 0 {
            return Err(format!("zero quantity for product {}", item.product.id));
        }
        if item.product.id.is_empty() {
            return Err("empty product id".to_string());
        }
        if !seen.insert(item.product.id.clone()) {
            return Err(format!("duplicate product {}", item.product.id));
        }
        let line = CartLine {
            product_id: item.product.id.clone(),
            quantity: item.quantity,
            remote_line_id: item.remote_line_id,
        };
        entries.push((item.product, line));
    }

    Ok(CartStore::from_entries(entries))
}
