use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::OrderId;
use tokio::sync::RwLock;

use crate::{NewOrder, Order, OrderError, OrderLedger, Result};

#[derive(Debug, Default)]
struct LedgerState {
    orders: Vec<Order>,
    last_id: i64,
}

/// In-memory order ledger for tests and database-less runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderLedger {
    state: Arc<RwLock<LedgerState>>,
    fail_on_create: Arc<AtomicBool>,
}

impl InMemoryOrderLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the ledger to fail every create call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn create(&self, order: NewOrder) -> Result<Order> {
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(OrderError::Unavailable("in-memory ledger offline".to_string()));
        }
        order.validate()?;

        let mut state = self.state.write().await;
        let order = order.into_order(OrderId::new(state.last_id + 1), Utc::now())?;
        state.last_id += 1;
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().rev().cloned().collect())
    }
}
