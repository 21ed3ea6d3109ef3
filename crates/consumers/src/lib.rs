//! Consumers of `order.created` events.
//!
//! A [`Worker`] reads one queue, decodes each delivery and hands it to an
//! [`EffectHandler`]. Handlers are idempotent per
//! [`EffectKey`](common::EffectKey), so redelivered events are acknowledged
//! without repeating their effect. The worker settles every delivery by the
//! same redelivery policy regardless of the effect.
//!
//! Handlers:
//! - [`StockDecrementHandler`]: decrements stock in the inventory ledger
//! - [`NotificationHandler`]: sends one confirmation per order

pub mod error;
pub mod handler;
pub mod notification;
pub mod stock;
pub mod worker;

pub use error::{ConsumerError, ProcessingError, Result};
pub use handler::{EffectHandler, EffectOutcome};
pub use notification::{
    InMemoryProcessedEffects, LogNotifier, NotificationHandler, Notifier, PgProcessedEffects,
    ProcessedEffects,
};
pub use stock::StockDecrementHandler;
pub use worker::{Disposition, RedeliveryPolicy, Worker};
