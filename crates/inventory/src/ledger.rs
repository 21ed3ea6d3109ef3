use async_trait::async_trait;
use common::{EffectKey, ProductId};

use crate::{DecrementOutcome, NewProduct, Product, Result};

/// Core trait for inventory ledger implementations.
///
/// The ledger is the single owner of product stock. Stock only changes
/// through [`InventoryLedger::set_stock`] (manual adjustment) and
/// [`InventoryLedger::apply_decrement`] (event-driven, idempotent).
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Gets a product by ID.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Lists all products, newest first.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Creates a product.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Overwrites the stock level of a product.
    async fn set_stock(&self, id: &ProductId, stock: u32) -> Result<Product>;

    /// Atomically records `key` and decrements the product's stock.
    ///
    /// Applying the same key twice leaves the stock untouched the second
    /// time. A decrement past zero clamps the stock at zero.
    async fn apply_decrement(
        &self,
        key: EffectKey,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<DecrementOutcome>;

    /// Number of products in the ledger.
    async fn product_count(&self) -> Result<usize>;
}

/// Extension trait providing convenience methods for inventory ledgers.
#[async_trait]
pub trait InventoryLedgerExt: InventoryLedger {
    /// Inserts `products` if the ledger is empty. Returns how many were added.
    async fn seed_if_empty(&self, products: Vec<NewProduct>) -> Result<usize> {
        if self.product_count().await? > 0 {
            return Ok(0);
        }
        let count = products.len();
        for product in products {
            self.create_product(product).await?;
        }
        tracing::info!(count, "seeded product catalogue");
        Ok(count)
    }
}

// Blanket implementation for all InventoryLedger implementations
impl<T: InventoryLedger + ?Sized> InventoryLedgerExt for T {}
