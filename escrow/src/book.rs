//! Book of open escrow agreements.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use tokenswap_common::{EscrowId, Result, SwapError, SwapTerms};
use tokenswap_ledger::AssetRegistry;

use crate::config::EscrowConfig;
use crate::engine::EscrowEngine;
use crate::metrics::{EscrowMetrics, SharedMetrics};

/// Index of escrow agreements with idempotent creation.
pub struct EscrowBook {
    /// Ledgers the agreements settle on.
    registry: Arc<AssetRegistry>,
    /// Configuration applied to every new agreement.
    config: EscrowConfig,
    /// Agreements indexed by ID.
    escrows: DashMap<EscrowId, Arc<EscrowEngine>>,
    /// Idempotency key to escrow ID mapping.
    idempotency_map: DashMap<String, EscrowId>,
    /// Serializes the capacity check with agreement creation.
    creation: Mutex<()>,
    metrics: SharedMetrics,
}

impl EscrowBook {
    /// Create a new book.
    pub fn new(registry: Arc<AssetRegistry>, config: EscrowConfig) -> Result<Self> {
        config.validate().map_err(SwapError::ConfigurationError)?;

        Ok(Self {
            registry,
            config,
            escrows: DashMap::new(),
            idempotency_map: DashMap::new(),
            creation: Mutex::new(()),
            metrics: Arc::new(EscrowMetrics::new()),
        })
    }

    /// Open an agreement, or return the one already opened under the key.
    ///
    /// Reusing a key with different terms fails with `DuplicateRequest`.
    #[instrument(skip(self, terms))]
    pub fn open(&self, idempotency_key: &str, terms: SwapTerms) -> Result<Arc<EscrowEngine>> {
        match self.idempotency_map.entry(idempotency_key.to_string()) {
            Entry::Occupied(existing) => {
                let engine = self.get(*existing.get())?;
                if *engine.terms() != terms {
                    warn!(escrow_id = %engine.id(), "Idempotency key reused with different terms");
                    return Err(SwapError::DuplicateRequest(idempotency_key.to_string()));
                }
                Ok(engine)
            }
            Entry::Vacant(slot) => {
                // Finalizations only lower the count while this is held.
                let _creation = self.creation.lock();
                let active = self.active_count();
                if active >= self.config.max_active_escrows {
                    warn!(active, "Escrow limit reached");
                    return Err(SwapError::EscrowLimitReached(active));
                }

                let engine = Arc::new(EscrowEngine::new(
                    terms,
                    &self.registry,
                    self.config.clone(),
                    Arc::clone(&self.metrics),
                )?);
                let id = engine.id();
                self.escrows.insert(id, Arc::clone(&engine));
                slot.insert(id);

                info!(escrow_id = %id, "Escrow opened");
                Ok(engine)
            }
        }
    }

    /// Get an agreement by ID.
    pub fn get(&self, id: EscrowId) -> Result<Arc<EscrowEngine>> {
        self.escrows
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SwapError::EscrowNotFound(id))
    }

    /// Get the number of agreements not yet executed or cancelled.
    pub fn active_count(&self) -> usize {
        self.metrics.escrows_active.load(Ordering::Relaxed) as usize
    }

    /// All agreement IDs, sorted.
    pub fn ids(&self) -> Vec<EscrowId> {
        let mut ids: Vec<EscrowId> = self.escrows.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.escrows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.escrows.is_empty()
    }

    pub fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }
}
