//! The `order.created` event contract and effect keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{OrderId, ProductId};

/// Event type name carried in message metadata.
pub const ORDER_CREATED: &str = "order.created";

/// Fact published once per successfully persisted order.
///
/// Wire format: `{"orderId": 1, "productId": "P1", "quantity": 2,
/// "timestamp": "2024-01-01T00:00:00Z"}`. `timestamp` is optional when
/// decoding so payloads from older producers are still accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedEvent {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Reasons an event payload cannot be turned into an [`OrderCreatedEvent`].
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// The payload is not valid JSON or misses required fields.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload decoded but violates the contract.
    #[error("invalid event: {0}")]
    Invalid(String),
}

impl OrderCreatedEvent {
    /// Creates an event stamped with the current time.
    pub fn new(order_id: OrderId, product_id: ProductId, quantity: u32) -> Self {
        Self {
            order_id,
            product_id,
            quantity,
            timestamp: Some(Utc::now()),
        }
    }

    /// Serializes the event to its JSON wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes and validates an event from its JSON wire form.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, EventDecodeError> {
        let event: Self = serde_json::from_slice(payload)?;
        if event.product_id.is_blank() {
            return Err(EventDecodeError::Invalid("productId is empty".to_string()));
        }
        if event.quantity == 0 {
            return Err(EventDecodeError::Invalid(
                "quantity must be positive".to_string(),
            ));
        }
        Ok(event)
    }

    /// Returns the idempotency key for applying `effect` to this event.
    pub fn effect_key(&self, effect: EffectType) -> EffectKey {
        EffectKey::new(self.order_id, effect)
    }
}

/// Kind of downstream effect an event triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    StockDecrement,
    Notification,
}

impl EffectType {
    /// Returns the stable storage name of the effect.
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectType::StockDecrement => "stock_decrement",
            EffectType::Notification => "notification",
        }
    }
}

impl std::fmt::Display for EffectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idempotency key: an effect is committed at most once per
/// `(order, effect type)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectKey {
    pub order_id: OrderId,
    pub effect: EffectType,
}

impl EffectKey {
    pub fn new(order_id: OrderId, effect: EffectType) -> Self {
        Self { order_id, effect }
    }
}

impl std::fmt::Display for EffectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.order_id, self.effect)
    }
}
