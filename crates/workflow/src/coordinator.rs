//! Order workflow coordinator.

use std::sync::Arc;
use std::time::Instant;

use broker::{EventPublisher, PublishOutcome};
use common::{EventId, OrderCreatedEvent, OrderId, ProductId};
use orders::{NewOrder, Order, OrderLedger};
use serde::Serialize;

use crate::catalog::ProductCatalog;
use crate::error::{Result, WorkflowError};

/// Input for placing an order.
///
/// `quantity` is taken wide so out-of-range values are rejected as invalid
/// instead of wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    pub product_id: String,
    pub quantity: i64,
}

impl PlaceOrder {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }

    fn validate(&self) -> Result<(ProductId, u32)> {
        let product_id = self.product_id.trim();
        if product_id.is_empty() {
            return Err(WorkflowError::InvalidRequest(
                "productId is required".to_string(),
            ));
        }
        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                WorkflowError::InvalidRequest(format!(
                    "quantity must be a positive integer, got {}",
                    self.quantity
                ))
            })?;
        Ok((ProductId::new(product_id), quantity))
    }
}

/// Which part of order placement happened in which communication style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Communication {
    pub sync: String,
    #[serde(rename = "async")]
    pub asynchronous: String,
}

impl Communication {
    fn for_order_placement() -> Self {
        Self {
            sync: "HTTP GET -> product service (product lookup and stock check)".to_string(),
            asynchronous: "order_events exchange -> order.created (stock decrement, notification)"
                .to_string(),
        }
    }
}

/// Result of a successful `create_order`.
#[derive(Debug, Clone)]
pub struct OrderPlacement {
    pub order: Order,
    pub event_id: EventId,
    pub publish: PublishOutcome,
    pub communication: Communication,
}

/// Coordinates order placement across the product service, the order
/// ledger and the broker.
///
/// 1. Look up the product synchronously and check stock (a point-in-time
///    read, not a reservation).
/// 2. Persist the order.
/// 3. Publish `order.created`; consumers converge their own state from it.
///
/// A persistence failure aborts before anything is published. A publish
/// failure never fails the order.
pub struct OrderWorkflow {
    catalog: Arc<dyn ProductCatalog>,
    ledger: Arc<dyn OrderLedger>,
    publisher: EventPublisher,
}

impl OrderWorkflow {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        ledger: Arc<dyn OrderLedger>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            catalog,
            ledger,
            publisher,
        }
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Places an order.
    #[tracing::instrument(skip(self), fields(product_id = %request.product_id, quantity = request.quantity))]
    pub async fn create_order(&self, request: PlaceOrder) -> Result<OrderPlacement> {
        let start = Instant::now();
        let result = self.place(request).await;
        metrics::histogram!("order_creation_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(placement) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %placement.order.id,
                    event_id = %placement.event_id,
                    event_published = placement.publish.is_published(),
                    "order created"
                );
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.reason()).increment(1);
                match e {
                    WorkflowError::UpstreamUnavailable(_) | WorkflowError::Persistence(_) => {
                        tracing::error!(error = %e, "order rejected")
                    }
                    _ => tracing::info!(error = %e, "order rejected"),
                }
            }
        }
        result
    }

    async fn place(&self, request: PlaceOrder) -> Result<OrderPlacement> {
        let (product_id, quantity) = request.validate()?;

        let product = self
            .catalog
            .fetch_product(&product_id)
            .await
            .map_err(|e| WorkflowError::UpstreamUnavailable(e.to_string()))?
            .ok_or_else(|| WorkflowError::ProductNotFound(product_id.clone()))?;
        tracing::debug!(name = %product.name, stock = product.stock, "product found");

        if quantity > product.stock {
            return Err(WorkflowError::InsufficientStock {
                product_id,
                available: product.stock,
                requested: quantity,
            });
        }

        if product.price.checked_multiply(quantity).is_none() {
            return Err(WorkflowError::InvalidRequest(format!(
                "total price of {quantity} x {} is out of range",
                product.price
            )));
        }

        let order = self
            .ledger
            .create(NewOrder::new(
                product_id.clone(),
                product.name,
                quantity,
                product.price,
            ))
            .await?;

        let event = OrderCreatedEvent::new(order.id, product_id, quantity);
        let publish = self.publisher.publish_order_created(&event).await;

        Ok(OrderPlacement {
            event_id: publish.event_id(),
            order,
            publish,
            communication: Communication::for_order_placement(),
        })
    }

    /// Gets a single order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.ledger.get(id).await?)
    }

    /// Lists all orders, newest first.
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.ledger.list().await?)
    }
}
