use async_trait::async_trait;
use common::{EffectType, OrderCreatedEvent};

use crate::ProcessingError;

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectOutcome {
    /// The effect was committed by this call.
    Applied,
    /// The effect had already been committed for this order.
    Duplicate,
    /// The event cannot have an effect and is dropped.
    Skipped(String),
}

/// Applies one kind of downstream effect for `order.created` events.
///
/// Implementations must be idempotent per
/// [`EffectKey`](common::EffectKey): handling the same event twice commits
/// the effect once.
#[async_trait]
pub trait EffectHandler: Send + Sync {
    /// Returns the effect this handler commits.
    fn effect(&self) -> EffectType;

    /// Applies the effect for `event`.
    async fn handle(&self, event: &OrderCreatedEvent) -> Result<EffectOutcome, ProcessingError>;
}
