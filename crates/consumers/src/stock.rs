//! Stock decrement effect for the product service.

use std::sync::Arc;

use async_trait::async_trait;
use common::{EffectType, OrderCreatedEvent};
use inventory::{DecrementOutcome, InventoryLedger};

use crate::{EffectHandler, EffectOutcome, ProcessingError};

/// Decrements product stock once per order.
pub struct StockDecrementHandler {
    ledger: Arc<dyn InventoryLedger>,
}

impl StockDecrementHandler {
    pub fn new(ledger: Arc<dyn InventoryLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl EffectHandler for StockDecrementHandler {
    fn effect(&self) -> EffectType {
        EffectType::StockDecrement
    }

    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_id, product_id = %event.product_id))]
    async fn handle(&self, event: &OrderCreatedEvent) -> Result<EffectOutcome, ProcessingError> {
        let key = event.effect_key(EffectType::StockDecrement);
        let outcome = self
            .ledger
            .apply_decrement(key, &event.product_id, event.quantity)
            .await?;

        match outcome {
            DecrementOutcome::Applied { remaining } => {
                tracing::info!(quantity = event.quantity, remaining, "stock decremented");
                Ok(EffectOutcome::Applied)
            }
            DecrementOutcome::AlreadyApplied => {
                tracing::debug!("stock decrement already applied");
                Ok(EffectOutcome::Duplicate)
            }
            DecrementOutcome::ProductMissing => {
                metrics::counter!("inventory_missing_product_total").increment(1);
                tracing::warn!("product missing, dropping stock decrement");
                Ok(EffectOutcome::Skipped("product not found".to_string()))
            }
            DecrementOutcome::Clamped {
                requested,
                available,
            } => {
                metrics::counter!("inventory_stock_anomalies_total").increment(1);
                tracing::warn!(
                    requested,
                    available,
                    "decrement exceeded stock, clamped to zero"
                );
                Ok(EffectOutcome::Applied)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderId, ProductId};
    use inventory::{InMemoryInventoryLedger, NewProduct};

    async fn setup(stock: u32) -> (StockDecrementHandler, InMemoryInventoryLedger) {
        let ledger = InMemoryInventoryLedger::new();
        ledger
            .create_product(NewProduct::new("Laptop", Money::from_major(25000), stock).with_id("P1"))
            .await
            .unwrap();
        (StockDecrementHandler::new(Arc::new(ledger.clone())), ledger)
    }

    async fn stock_of(ledger: &InMemoryInventoryLedger) -> u32 {
        ledger
            .get_product(&ProductId::new("P1"))
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    fn order(id: i64, product: &str, quantity: u32) -> OrderCreatedEvent {
        OrderCreatedEvent::new(OrderId::new(id), ProductId::new(product), quantity)
    }

    #[tokio::test]
    async fn test_same_order_decrements_once() {
        let (handler, ledger) = setup(50).await;

        assert_eq!(
            handler.handle(&order(1, "P1", 2)).await.unwrap(),
            EffectOutcome::Applied
        );
        assert_eq!(
            handler.handle(&order(1, "P1", 2)).await.unwrap(),
            EffectOutcome::Duplicate
        );
        assert_eq!(stock_of(&ledger).await, 48);
    }

    #[tokio::test]
    async fn test_missing_product_is_skipped() {
        let (handler, _) = setup(50).await;
        let outcome = handler.handle(&order(1, "ghost", 1)).await.unwrap();
        assert!(matches!(outcome, EffectOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_oversell_clamps_to_zero() {
        let (handler, ledger) = setup(1).await;
        let outcome = handler.handle(&order(1, "P1", 4)).await.unwrap();
        assert_eq!(outcome, EffectOutcome::Applied);
        assert_eq!(stock_of(&ledger).await, 0);
    }

    #[tokio::test]
    async fn test_ledger_outage_is_transient() {
        let (handler, ledger) = setup(5).await;
        ledger.set_unavailable(true);
        let err = handler.handle(&order(1, "P1", 1)).await.unwrap_err();
        assert!(err.is_transient());
    }
}
