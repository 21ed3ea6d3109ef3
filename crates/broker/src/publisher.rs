//! Reconnect-aware producer handle for order events.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use common::{EventId, OrderCreatedEvent};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::{Broker, BrokerError, Connector, OutboundMessage, ReconnectPolicy, connect_with_retry};

/// Why an event was not handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    /// No usable connection at publish time.
    #[error("broker unavailable")]
    BrokerUnavailable,

    /// The broker accepted the publish but no queue was bound to take it.
    #[error("unroutable: {0}")]
    Unroutable(String),

    /// The broker rejected or failed the publish.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// The event could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl DropReason {
    /// Metric label for this reason.
    pub fn label(&self) -> &'static str {
        match self {
            DropReason::BrokerUnavailable => "broker_unavailable",
            DropReason::Unroutable(_) => "unroutable",
            DropReason::PublishFailed(_) => "publish_failed",
            DropReason::Serialization(_) => "serialization",
        }
    }
}

/// Result of a best-effort publish.
///
/// Publishing never fails the caller: a drop is reported, logged and counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { event_id: EventId },
    Dropped { event_id: EventId, reason: DropReason },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }

    pub fn event_id(&self) -> EventId {
        match self {
            PublishOutcome::Published { event_id } | PublishOutcome::Dropped { event_id, .. } => {
                *event_id
            }
        }
    }
}

struct Inner {
    exchange: String,
    broker: RwLock<Option<Arc<dyn Broker>>>,
    lost: Notify,
}

/// Shared publisher for one exchange.
///
/// Cloning is cheap; all clones see the same connection. The connection is
/// installed by [`EventPublisher::spawn_supervisor`] (or directly with
/// [`EventPublisher::install`]) and replaced whenever it is lost.
#[derive(Clone)]
pub struct EventPublisher {
    inner: Arc<Inner>,
}

impl EventPublisher {
    /// Creates a publisher with no connection yet.
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                exchange: exchange.into(),
                broker: RwLock::new(None),
                lost: Notify::new(),
            }),
        }
    }

    /// Creates a publisher and installs `broker`, declaring the exchange.
    pub async fn connected(exchange: impl Into<String>, broker: Arc<dyn Broker>) -> crate::Result<Self> {
        let publisher = Self::new(exchange);
        publisher.install(broker).await?;
        Ok(publisher)
    }

    pub fn exchange(&self) -> &str {
        &self.inner.exchange
    }

    /// Declares the exchange on `broker` and makes it the active connection.
    pub async fn install(&self, broker: Arc<dyn Broker>) -> crate::Result<()> {
        broker.declare_exchange(&self.inner.exchange).await?;
        *self
            .inner
            .broker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(broker);
        tracing::info!(exchange = %self.inner.exchange, "event publisher connected");
        Ok(())
    }

    /// Drops the active connection and wakes the supervisor.
    pub fn disconnect(&self) {
        let previous = self
            .inner
            .broker
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::warn!(exchange = %self.inner.exchange, "event publisher lost its connection");
        }
        self.inner.lost.notify_one();
    }

    /// Returns true if a usable connection is installed.
    pub fn is_connected(&self) -> bool {
        self.current().is_some_and(|broker| broker.is_connected())
    }

    fn current(&self) -> Option<Arc<dyn Broker>> {
        self.inner
            .broker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publishes `message`, assigning an event ID if it has none.
    #[tracing::instrument(skip(self, message), fields(exchange = %self.inner.exchange))]
    pub async fn publish(&self, mut message: OutboundMessage) -> PublishOutcome {
        let event_id = *message.headers.event_id.get_or_insert_with(EventId::new);

        let Some(broker) = self.current().filter(|broker| broker.is_connected()) else {
            return self.dropped(event_id, DropReason::BrokerUnavailable);
        };

        match broker.publish(&self.inner.exchange, message).await {
            Ok(()) => {
                metrics::counter!("order_events_published_total").increment(1);
                tracing::debug!(%event_id, "event published");
                PublishOutcome::Published { event_id }
            }
            // The connection is healthy; only the topology is missing a queue.
            Err(BrokerError::Unroutable { reason, .. }) => {
                self.dropped(event_id, DropReason::Unroutable(reason))
            }
            Err(e) => {
                self.disconnect();
                self.dropped(event_id, DropReason::PublishFailed(e.to_string()))
            }
        }
    }

    /// Encodes and publishes an `order.created` event.
    pub async fn publish_order_created(&self, event: &OrderCreatedEvent) -> PublishOutcome {
        match OutboundMessage::order_created(event) {
            Ok(message) => self.publish(message).await,
            Err(e) => self.dropped(EventId::new(), DropReason::Serialization(e.to_string())),
        }
    }

    fn dropped(&self, event_id: EventId, reason: DropReason) -> PublishOutcome {
        metrics::counter!("order_events_dropped_total", "reason" => reason.label()).increment(1);
        tracing::warn!(%event_id, %reason, exchange = %self.inner.exchange, "event dropped");
        PublishOutcome::Dropped { event_id, reason }
    }

    /// Keeps a connection installed for the lifetime of the process.
    ///
    /// Connects with `policy`, then waits until the connection is lost
    /// (reported by a failed publish, or noticed on the periodic health
    /// check) and connects again. The task ends only if a bounded policy
    /// gives up. It runs inside the caller's current span.
    pub fn spawn_supervisor(
        &self,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
    ) -> JoinHandle<()> {
        let publisher = self.clone();
        let check_interval = policy.delay_for_attempt(0).max(Duration::from_millis(100));

        tokio::spawn(
            async move {
                loop {
                    if !publisher.is_connected() {
                        let broker = match connect_with_retry(connector.as_ref(), &policy).await {
                            Ok(broker) => broker,
                            Err(e) => {
                                tracing::error!(error = %e, "event publisher supervisor stopped");
                                return;
                            }
                        };
                        if let Err(e) = publisher.install(broker).await {
                            tracing::warn!(error = %e, "failed to declare exchange, reconnecting");
                            tokio::time::sleep(check_interval).await;
                            continue;
                        }
                    }

                    tokio::select! {
                        _ = publisher.inner.lost.notified() => {}
                        _ = tokio::time::sleep(check_interval) => {}
                    }
                }
            }
            .in_current_span(),
        )
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("exchange", &self.inner.exchange)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrokerExt, InMemoryBroker, ORDER_EVENTS_EXCHANGE, QueueBinding};
    use common::{OrderId, ProductId};
    use futures_util::StreamExt;

    fn event() -> OrderCreatedEvent {
        OrderCreatedEvent::new(OrderId::new(1), ProductId::new("P1"), 2)
    }

    #[tokio::test]
    async fn test_publish_without_connection_is_dropped() {
        let publisher = EventPublisher::new(ORDER_EVENTS_EXCHANGE);

        let outcome = publisher.publish_order_created(&event()).await;

        assert!(!outcome.is_published());
        assert!(matches!(
            outcome,
            PublishOutcome::Dropped {
                reason: DropReason::BrokerUnavailable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_publish_reaches_bound_queue() {
        let broker = InMemoryBroker::new();
        let mut stream = broker
            .subscribe(&QueueBinding::stock_updates(), "test")
            .await
            .unwrap();
        let publisher = EventPublisher::connected(ORDER_EVENTS_EXCHANGE, Arc::new(broker.clone()))
            .await
            .unwrap();

        let outcome = publisher.publish_order_created(&event()).await;
        assert!(outcome.is_published());

        let delivery = stream.next().await.unwrap().unwrap();
        assert_eq!(delivery.headers().event_id, Some(outcome.event_id()));
        assert_eq!(
            OrderCreatedEvent::from_bytes(delivery.payload()).unwrap(),
            event()
        );
    }

    #[tokio::test]
    async fn test_failed_publish_clears_connection() {
        let broker = InMemoryBroker::new();
        let publisher = EventPublisher::connected(ORDER_EVENTS_EXCHANGE, Arc::new(broker.clone()))
            .await
            .unwrap();
        broker.set_fail_on_publish(true);

        let outcome = publisher.publish_order_created(&event()).await;

        assert!(matches!(
            outcome,
            PublishOutcome::Dropped {
                reason: DropReason::PublishFailed(_),
                ..
            }
        ));
        assert!(!publisher.is_connected());
    }

    #[tokio::test]
    async fn test_unroutable_publish_is_dropped_but_keeps_connection() {
        let broker = InMemoryBroker::new();
        let publisher = EventPublisher::connected(ORDER_EVENTS_EXCHANGE, Arc::new(broker.clone()))
            .await
            .unwrap();

        let outcome = publisher.publish_order_created(&event()).await;

        assert!(matches!(
            outcome,
            PublishOutcome::Dropped {
                reason: DropReason::Unroutable(_),
                ..
            }
        ));
        assert!(publisher.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_reconnects_after_outage() {
        let broker = InMemoryBroker::new();
        broker
            .subscribe(&QueueBinding::stock_updates(), "test")
            .await
            .unwrap();
        broker.set_unavailable(true);
        let publisher = EventPublisher::new(ORDER_EVENTS_EXCHANGE);
        let supervisor = publisher.spawn_supervisor(
            Arc::new(broker.clone()),
            ReconnectPolicy::fixed(Duration::from_secs(5)),
        );

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(!publisher.is_connected());

        broker.set_unavailable(false);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(publisher.is_connected());

        let outcome = publisher.publish_order_created(&event()).await;
        assert!(outcome.is_published());

        supervisor.abort();
    }

    /// Records the root span name of every event.
    #[derive(Clone, Default)]
    struct RootSpans(Arc<std::sync::Mutex<Vec<Option<String>>>>);

    impl<S> tracing_subscriber::Layer<S> for RootSpans
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let root = ctx
                .event_scope(event)
                .and_then(|scope| scope.from_root().next().map(|s| s.name().to_string()));
            self.0.lock().unwrap().push(root);
        }
    }

    #[tokio::test]
    async fn test_supervisor_logs_inside_callers_span() {
        use tracing_subscriber::layer::SubscriberExt;

        let roots = RootSpans::default();
        let _default =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(roots.clone()));

        let broker = InMemoryBroker::new();
        let publisher = EventPublisher::new(ORDER_EVENTS_EXCHANGE);
        let supervisor = {
            let _entered = tracing::info_span!("service").entered();
            publisher.spawn_supervisor(
                Arc::new(broker),
                ReconnectPolicy::fixed(Duration::from_millis(10)),
            )
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        supervisor.abort();

        assert!(publisher.is_connected());
        let roots = roots.0.lock().unwrap().clone();
        assert!(!roots.is_empty());
        assert!(roots.iter().all(|root| root.as_deref() == Some("service")));
    }
}
