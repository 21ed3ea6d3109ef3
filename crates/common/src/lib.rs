//! Shared types for the order placement services.
//!
//! Everything that crosses a service boundary lives here: identifiers,
//! money, the `order.created` event contract and the effect keys consumers
//! use to apply each event at most once.

pub mod event;
pub mod ids;
pub mod money;

pub use event::{EffectKey, EffectType, EventDecodeError, ORDER_CREATED, OrderCreatedEvent};
pub use ids::{EventId, OrderId, ProductId};
pub use money::Money;
