//! Generic queue worker with bounded redelivery.

use std::sync::Arc;
use std::time::Instant;

use broker::{
    BrokerExt, Connector, Delivery, DeliveryStream, QueueBinding, ReconnectPolicy,
    connect_with_retry,
};
use common::OrderCreatedEvent;
use futures_util::StreamExt;

use crate::{EffectHandler, EffectOutcome, ProcessingError, Result};

/// How many times a transiently failing message is retried before it is
/// dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    pub max_redeliveries: u32,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            max_redeliveries: 5,
        }
    }
}

impl RedeliveryPolicy {
    pub fn new(max_redeliveries: u32) -> Self {
        Self { max_redeliveries }
    }

    /// Returns true if a message already retried `retry_count` times may be
    /// retried again.
    pub fn allows_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_redeliveries
    }
}

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Effect applied; acknowledged.
    Acked,
    /// Effect was already applied; acknowledged.
    Duplicate,
    /// Event could not have an effect; acknowledged and dropped.
    Skipped,
    /// Re-enqueued on the same queue with the given retry count.
    Retried(u32),
    /// Moved to the dead-letter queue.
    DeadLettered,
}

impl Disposition {
    /// Metric label for this disposition.
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::Acked => "acked",
            Disposition::Duplicate => "duplicate",
            Disposition::Skipped => "skipped",
            Disposition::Retried(_) => "retried",
            Disposition::DeadLettered => "dead_lettered",
        }
    }
}

/// Consumes one queue and applies one effect per delivery.
///
/// Deliveries are handled one at a time. Every delivery is settled exactly
/// once:
///
/// | handling result                    | disposition                  |
/// |------------------------------------|------------------------------|
/// | malformed or invalid payload       | dead-letter                  |
/// | applied / duplicate / skipped      | ack                          |
/// | transient, retries left            | retry with count + 1         |
/// | transient, retries exhausted       | dead-letter                  |
/// | permanent                          | dead-letter                  |
pub struct Worker {
    queue: String,
    handler: Arc<dyn EffectHandler>,
    policy: RedeliveryPolicy,
}

impl Worker {
    pub fn new(
        queue: impl Into<String>,
        handler: Arc<dyn EffectHandler>,
        policy: RedeliveryPolicy,
    ) -> Self {
        Self {
            queue: queue.into(),
            handler,
            policy,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Handles and settles a single delivery.
    #[tracing::instrument(
        skip(self, delivery),
        fields(
            queue = %self.queue,
            effect = %self.handler.effect(),
            event_id = ?delivery.headers().event_id,
            retry_count = delivery.retry_count(),
        )
    )]
    pub async fn handle_delivery(&self, delivery: Delivery) -> Result<Disposition> {
        let start = Instant::now();
        let disposition = self.settle(delivery).await?;

        metrics::counter!(
            "consumer_messages_total",
            "queue" => self.queue.clone(),
            "disposition" => disposition.label()
        )
        .increment(1);
        metrics::histogram!("consumer_processing_duration_seconds", "queue" => self.queue.clone())
            .record(start.elapsed().as_secs_f64());

        Ok(disposition)
    }

    async fn settle(&self, delivery: Delivery) -> Result<Disposition> {
        let event = match OrderCreatedEvent::from_bytes(delivery.payload()) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "malformed event, dead-lettering");
                delivery.dead_letter(&e.to_string()).await?;
                return Ok(Disposition::DeadLettered);
            }
        };

        match self.handler.handle(&event).await {
            Ok(EffectOutcome::Applied) => {
                delivery.ack().await?;
                Ok(Disposition::Acked)
            }
            Ok(EffectOutcome::Duplicate) => {
                tracing::info!(order_id = %event.order_id, "duplicate delivery acknowledged");
                delivery.ack().await?;
                Ok(Disposition::Duplicate)
            }
            Ok(EffectOutcome::Skipped(reason)) => {
                tracing::warn!(order_id = %event.order_id, %reason, "event skipped");
                delivery.ack().await?;
                Ok(Disposition::Skipped)
            }
            Err(ProcessingError::Transient(reason))
                if self.policy.allows_retry(delivery.retry_count()) =>
            {
                let retry_count = delivery.retry().await?;
                tracing::warn!(order_id = %event.order_id, %reason, retry_count, "transient failure, retrying");
                Ok(Disposition::Retried(retry_count))
            }
            Err(ProcessingError::Transient(reason)) => {
                tracing::error!(order_id = %event.order_id, %reason, "retries exhausted, dead-lettering");
                delivery
                    .dead_letter(&format!("retries exhausted: {reason}"))
                    .await?;
                Ok(Disposition::DeadLettered)
            }
            Err(ProcessingError::Permanent(reason)) => {
                tracing::error!(order_id = %event.order_id, %reason, "permanent failure, dead-lettering");
                delivery.dead_letter(&reason).await?;
                Ok(Disposition::DeadLettered)
            }
        }
    }

    /// Handles deliveries until the stream ends. Returns how many were settled.
    pub async fn run(&self, mut stream: DeliveryStream) -> Result<u64> {
        let mut settled = 0;
        while let Some(next) = stream.next().await {
            let delivery = match next {
                Ok(delivery) => delivery,
                Err(e) => {
                    tracing::warn!(queue = %self.queue, error = %e, "delivery stream failed");
                    break;
                }
            };
            self.handle_delivery(delivery).await?;
            settled += 1;
        }
        tracing::info!(queue = %self.queue, settled, "delivery stream ended");
        Ok(settled)
    }

    /// Connects, subscribes and runs until the connection drops, then starts
    /// over. Returns only if a bounded `reconnect` policy gives up.
    pub async fn run_supervised(
        &self,
        connector: Arc<dyn Connector>,
        binding: QueueBinding,
        reconnect: ReconnectPolicy,
    ) -> Result<()> {
        let consumer_tag = format!("{}.worker", binding.queue);
        loop {
            let broker = connect_with_retry(connector.as_ref(), &reconnect).await?;

            match broker.subscribe(&binding, &consumer_tag).await {
                Ok(stream) => {
                    tracing::info!(queue = %binding.queue, "consumer started");
                    if let Err(e) = self.run(stream).await {
                        tracing::warn!(queue = %binding.queue, error = %e, "consumer stopped");
                    }
                }
                Err(e) => {
                    tracing::warn!(queue = %binding.queue, error = %e, "subscribe failed");
                }
            }

            tokio::time::sleep(reconnect.delay_for_attempt(0)).await;
        }
    }
}
