use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{Delivery, OutboundMessage, QueueBinding, Result};

/// A stream of deliveries from one queue.
///
/// The stream ends when the underlying connection or channel goes away;
/// consumers are expected to reconnect and subscribe again.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery>> + Send>>;

/// Core trait for broker implementations.
///
/// All implementations must be thread-safe (Send + Sync) so a single handle
/// can be shared between the request path and background tasks.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declares a durable fan-out exchange. Idempotent.
    async fn declare_exchange(&self, exchange: &str) -> Result<()>;

    /// Declares the binding's queue and dead-letter queue and binds the
    /// queue to its exchange. Idempotent.
    async fn declare_queue(&self, binding: &QueueBinding) -> Result<()>;

    /// Publishes a message to an exchange.
    ///
    /// Returns once the broker has confirmed the message. A message no queue
    /// is bound to receive fails with [`BrokerError::Unroutable`](crate::BrokerError::Unroutable).
    async fn publish(&self, exchange: &str, message: OutboundMessage) -> Result<()>;

    /// Starts consuming from a queue. Deliveries must be settled explicitly.
    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream>;

    /// Returns true while the underlying connection is usable.
    fn is_connected(&self) -> bool;
}

/// Extension trait providing convenience methods for brokers.
#[async_trait]
pub trait BrokerExt: Broker {
    /// Declares the exchange and queue for `binding`, then consumes from it.
    async fn subscribe(&self, binding: &QueueBinding, consumer_tag: &str) -> Result<DeliveryStream> {
        self.declare_exchange(&binding.exchange).await?;
        self.declare_queue(binding).await?;
        self.consume(&binding.queue, consumer_tag).await
    }
}

// Blanket implementation for all Broker implementations
impl<T: Broker + ?Sized> BrokerExt for T {}

/// Opens new broker connections.
///
/// Used by the reconnection loop: every call yields a fresh handle.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects and opens a channel.
    async fn connect(&self) -> Result<Arc<dyn Broker>>;

    /// Human-readable target for logs, without credentials.
    fn describe(&self) -> String;
}
