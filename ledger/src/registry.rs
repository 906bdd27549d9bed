//! Registry of deployed ledgers keyed by asset id.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use tokenswap_common::{AssetId, Result, SwapError};

use crate::engine::Ledger;
use crate::token::TokenConfig;

/// Registry of deployed ledgers.
pub struct AssetRegistry {
    ledgers: DashMap<AssetId, Arc<Ledger>>,
}

impl AssetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            ledgers: DashMap::new(),
        }
    }

    /// Deploy a new ledger under a fresh asset id and register it.
    pub fn deploy(&self, config: TokenConfig) -> Result<Arc<Ledger>> {
        let ledger = Arc::new(Ledger::new(config)?);
        self.register(Arc::clone(&ledger))?;
        Ok(ledger)
    }

    /// Register an existing ledger.
    pub fn register(&self, ledger: Arc<Ledger>) -> Result<()> {
        let id = ledger.id();
        match self.ledgers.entry(id) {
            Entry::Occupied(_) => Err(SwapError::AssetAlreadyRegistered(id)),
            Entry::Vacant(slot) => {
                info!(asset = %id, symbol = %ledger.symbol(), "Asset registered");
                slot.insert(ledger);
                Ok(())
            }
        }
    }

    /// Look up a ledger.
    pub fn get(&self, asset: &AssetId) -> Result<Arc<Ledger>> {
        self.ledgers
            .get(asset)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SwapError::UnknownAsset(*asset))
    }

    /// Check if an asset is registered.
    pub fn contains(&self, asset: &AssetId) -> bool {
        self.ledgers.contains_key(asset)
    }

    /// Number of registered assets.
    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    /// Check if no asset is registered.
    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    /// Registered asset ids in lock order.
    pub fn asset_ids(&self) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self.ledgers.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Check integrity of every registered ledger.
    pub fn verify_integrity(&self) -> bool {
        self.ledgers.iter().all(|entry| entry.value().verify_integrity())
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
