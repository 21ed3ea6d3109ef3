use async_trait::async_trait;
use common::OrderId;

use crate::{NewOrder, Order, Result};

/// Core trait for order ledger implementations.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Persists a new order and returns it with its assigned ID.
    async fn create(&self, order: NewOrder) -> Result<Order>;

    /// Gets an order by ID.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists all orders, newest first.
    async fn list(&self) -> Result<Vec<Order>>;
}
