//! Exchange and queue names shared by producers and consumers.

/// Durable fan-out exchange for order domain events.
pub const ORDER_EVENTS_EXCHANGE: &str = "order_events";

/// Queue consumed by the product service to decrement stock.
pub const STOCK_UPDATE_QUEUE: &str = "product_stock_update";

/// Queue consumed by the notification service.
pub const MAIL_NOTIFICATION_QUEUE: &str = "mail_notification";

/// Suffix appended to a queue name to form its dead-letter queue.
pub const DEAD_LETTER_SUFFIX: &str = ".dead_letter";

/// A durable consumer queue bound to a fan-out exchange.
///
/// Queues are durable, non-exclusive and never auto-deleted. The routing key
/// is empty: a fan-out exchange copies every message to every bound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
}

impl QueueBinding {
    /// Binds `queue` to `exchange` with an empty routing key.
    pub fn fanout(queue: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: String::new(),
        }
    }

    /// Binding for the stock-decrement consumer.
    pub fn stock_updates() -> Self {
        Self::fanout(STOCK_UPDATE_QUEUE, ORDER_EVENTS_EXCHANGE)
    }

    /// Binding for the notification consumer.
    pub fn mail_notifications() -> Self {
        Self::fanout(MAIL_NOTIFICATION_QUEUE, ORDER_EVENTS_EXCHANGE)
    }

    /// Name of the dead-letter queue paired with this queue.
    pub fn dead_letter_queue(&self) -> String {
        dead_letter_queue_for(&self.queue)
    }
}

/// Returns the dead-letter queue name for `queue`.
pub fn dead_letter_queue_for(queue: &str) -> String {
    format!("{queue}{DEAD_LETTER_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_binding_has_empty_routing_key() {
        let binding = QueueBinding::stock_updates();
        assert_eq!(binding.queue, "product_stock_update");
        assert_eq!(binding.exchange, "order_events");
        assert!(binding.routing_key.is_empty());
    }

    #[test]
    fn dead_letter_queue_name() {
        assert_eq!(
            QueueBinding::mail_notifications().dead_letter_queue(),
            "mail_notification.dead_letter"
        );
    }
}
