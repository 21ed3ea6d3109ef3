use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{EffectKey, ProductId};
use tokio::sync::RwLock;

use crate::product::decrement;
use crate::{DecrementOutcome, InventoryError, InventoryLedger, NewProduct, Product, Result};

#[derive(Debug, Default)]
struct LedgerState {
    /// Insertion order; listing reverses it.
    products: Vec<Product>,
    applied: HashSet<EffectKey>,
}

impl LedgerState {
    fn find_mut(&mut self, id: &ProductId) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| &p.id == id)
    }
}

/// In-memory inventory ledger.
///
/// Provides the same interface and atomicity as the PostgreSQL ledger: the
/// effect key and the stock change are committed under one write lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryLedger {
    state: Arc<RwLock<LedgerState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryInventoryLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with [`InventoryError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of effect keys recorded so far.
    pub async fn applied_effect_count(&self) -> usize {
        self.state.read().await.applied.len()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(InventoryError::Unavailable(
                "in-memory ledger offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryLedger for InMemoryInventoryLedger {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state.products.iter().find(|p| &p.id == id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state.products.iter().rev().cloned().collect())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        self.ensure_available()?;
        let product = product.into_product(Utc::now())?;
        let mut state = self.state.write().await;

        if state.products.iter().any(|p| p.id == product.id) {
            return Err(InventoryError::AlreadyExists(product.id));
        }
        state.products.push(product.clone());
        Ok(product)
    }

    async fn set_stock(&self, id: &ProductId, stock: u32) -> Result<Product> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let product = state
            .find_mut(id)
            .ok_or_else(|| InventoryError::ProductNotFound(id.clone()))?;
        product.stock = stock;
        Ok(product.clone())
    }

    async fn apply_decrement(
        &self,
        key: EffectKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<DecrementOutcome> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        if state.applied.contains(&key) {
            return Ok(DecrementOutcome::AlreadyApplied);
        }
        let Some(product) = state.find_mut(product_id) else {
            return Ok(DecrementOutcome::ProductMissing);
        };

        let (stock, outcome) = decrement(product.stock, quantity);
        product.stock = stock;
        state.applied.insert(key);
        Ok(outcome)
    }

    async fn product_count(&self) -> Result<usize> {
        self.ensure_available()?;
        Ok(self.state.read().await.products.len())
    }
}
