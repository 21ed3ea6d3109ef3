//! Outbound messages, inbound deliveries and their metadata.

use async_trait::async_trait;
use common::{EventId, ORDER_CREATED, OrderCreatedEvent};

use crate::Result;

/// Header carrying the number of times a message was retried.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Header carrying the domain event type.
pub const EVENT_TYPE_HEADER: &str = "x-event-type";

/// Header recording why a message was dead-lettered.
pub const DEATH_REASON_HEADER: &str = "x-death-reason";

/// Metadata travelling with every message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    /// Stable event identifier, set once at publish time.
    pub event_id: Option<EventId>,
    /// Domain event type, e.g. `order.created`.
    pub event_type: Option<String>,
    /// Retries performed so far; absent on the wire means zero.
    pub retry_count: u32,
    /// Set when the message was moved to a dead-letter queue.
    pub death_reason: Option<String>,
}

impl MessageHeaders {
    /// Headers for a freshly published event.
    pub fn for_event(event_id: EventId, event_type: impl Into<String>) -> Self {
        Self {
            event_id: Some(event_id),
            event_type: Some(event_type.into()),
            retry_count: 0,
            death_reason: None,
        }
    }

    /// Copy of these headers with the retry counter incremented.
    pub fn next_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count.saturating_add(1),
            ..self.clone()
        }
    }

    /// Copy of these headers annotated with a dead-letter reason.
    pub fn dead_lettered(&self, reason: impl Into<String>) -> Self {
        Self {
            death_reason: Some(reason.into()),
            ..self.clone()
        }
    }
}

/// A message ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub payload: Vec<u8>,
    pub headers: MessageHeaders,
}

impl OutboundMessage {
    pub fn new(payload: Vec<u8>, headers: MessageHeaders) -> Self {
        Self { payload, headers }
    }

    /// Encodes an `order.created` event under a fresh event ID.
    pub fn order_created(event: &OrderCreatedEvent) -> Result<Self> {
        Ok(Self {
            payload: event.to_bytes()?,
            headers: MessageHeaders::for_event(EventId::new(), ORDER_CREATED),
        })
    }

    /// The event ID carried by this message, if any.
    pub fn event_id(&self) -> Option<EventId> {
        self.headers.event_id
    }
}

/// Backend-specific settlement of a delivery.
///
/// `retry` and `dead_letter` re-publish the payload with the given headers
/// and then acknowledge the original, so only the consuming queue sees the
/// copy.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Positively acknowledges the delivery.
    async fn ack(&self) -> Result<()>;

    /// Negatively acknowledges the delivery and asks the broker to requeue it.
    async fn requeue(&self) -> Result<()>;

    /// Re-enqueues the payload on the same queue with `headers`.
    async fn retry(&self, payload: &[u8], headers: &MessageHeaders) -> Result<()>;

    /// Moves the payload to the queue's dead-letter queue with `headers`.
    async fn dead_letter(&self, payload: &[u8], headers: &MessageHeaders) -> Result<()>;
}

/// A message received from a queue, awaiting settlement.
///
/// Every settlement method consumes the delivery, so a message is settled
/// exactly once.
pub struct Delivery {
    queue: String,
    payload: Vec<u8>,
    headers: MessageHeaders,
    redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        queue: impl Into<String>,
        payload: Vec<u8>,
        headers: MessageHeaders,
        redelivered: bool,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            queue: queue.into(),
            payload,
            headers,
            redelivered,
            acker,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    pub fn retry_count(&self) -> u32 {
        self.headers.retry_count
    }

    /// True if the broker flagged this as a redelivery of an unsettled message.
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    pub async fn ack(self) -> Result<()> {
        self.acker.ack().await
    }

    pub async fn requeue(self) -> Result<()> {
        self.acker.requeue().await
    }

    /// Schedules another attempt and returns the new retry count.
    pub async fn retry(self) -> Result<u32> {
        let headers = self.headers.next_retry();
        self.acker.retry(&self.payload, &headers).await?;
        Ok(headers.retry_count)
    }

    pub async fn dead_letter(self, reason: &str) -> Result<()> {
        let headers = self.headers.dead_lettered(reason);
        self.acker.dead_letter(&self.payload, &headers).await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("queue", &self.queue)
            .field("headers", &self.headers)
            .field("redelivered", &self.redelivered)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
