//! Broker abstraction for the `order_events` fan-out.
//!
//! - [`Broker`] declares topology, publishes and consumes
//! - [`Delivery`] carries a message plus its acknowledgement handle
//!   (ack, requeue, bounded retry, dead-letter)
//! - [`EventPublisher`] is the reconnect-aware producer handle
//! - [`connect_with_retry`] drives the startup reconnection loop
//!
//! Two backends: [`AmqpBroker`] (RabbitMQ via lapin) and
//! [`InMemoryBroker`] with the same fan-out semantics for tests.

pub mod amqp;
pub mod broker;
pub mod error;
pub mod memory;
pub mod message;
pub mod publisher;
pub mod reconnect;
pub mod topology;

pub use amqp::{AmqpBroker, AmqpConnector};
pub use broker::{Broker, BrokerExt, Connector, DeliveryStream};
pub use error::{BrokerError, Result};
pub use memory::InMemoryBroker;
pub use message::{Acknowledger, Delivery, MessageHeaders, OutboundMessage};
pub use publisher::{DropReason, EventPublisher, PublishOutcome};
pub use reconnect::{ReconnectPolicy, connect_with_retry};
pub use topology::{
    MAIL_NOTIFICATION_QUEUE, ORDER_EVENTS_EXCHANGE, QueueBinding, STOCK_UPDATE_QUEUE,
};
