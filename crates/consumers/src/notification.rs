//! Order confirmation effect for the notification service.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::{EffectKey, EffectType, OrderCreatedEvent};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::{EffectHandler, EffectOutcome, ProcessingError};

/// Delivers order notifications to customers.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: &OrderCreatedEvent) -> Result<(), ProcessingError>;
}

/// Notifier that writes the mail to the log instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, event: &OrderCreatedEvent) -> Result<(), ProcessingError> {
        tracing::info!(
            order_id = %event.order_id,
            product_id = %event.product_id,
            quantity = event.quantity,
            "order confirmation mail sent"
        );
        Ok(())
    }
}

/// Record of effects already committed, keyed by [`EffectKey`].
#[async_trait]
pub trait ProcessedEffects: Send + Sync {
    async fn contains(&self, key: EffectKey) -> Result<bool, ProcessingError>;

    /// Records `key`. Returns false if it was already present.
    async fn record(&self, key: EffectKey) -> Result<bool, ProcessingError>;
}

/// Process-local processed-effects store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessedEffects {
    keys: Arc<RwLock<HashSet<EffectKey>>>,
}

impl InMemoryProcessedEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

#[async_trait]
impl ProcessedEffects for InMemoryProcessedEffects {
    async fn contains(&self, key: EffectKey) -> Result<bool, ProcessingError> {
        Ok(self.keys.read().await.contains(&key))
    }

    async fn record(&self, key: EffectKey) -> Result<bool, ProcessingError> {
        Ok(self.keys.write().await.insert(key))
    }
}

/// Processed-effects store on the shared `applied_effects` table.
#[derive(Clone)]
pub struct PgProcessedEffects {
    pool: PgPool,
}

impl PgProcessedEffects {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEffects for PgProcessedEffects {
    async fn contains(&self, key: EffectKey) -> Result<bool, ProcessingError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM applied_effects WHERE order_id = $1 AND effect_type = $2)",
        )
        .bind(key.order_id.as_i64())
        .bind(key.effect.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn record(&self, key: EffectKey) -> Result<bool, ProcessingError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO applied_effects (order_id, effect_type)
            VALUES ($1, $2)
            ON CONFLICT (order_id, effect_type) DO NOTHING
            "#,
        )
        .bind(key.order_id.as_i64())
        .bind(key.effect.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted > 0)
    }
}

/// Sends one confirmation per order.
///
/// The key is recorded after a successful send, so a crash between the two
/// can repeat a notification but never lose one.
pub struct NotificationHandler {
    notifier: Arc<dyn Notifier>,
    processed: Arc<dyn ProcessedEffects>,
}

impl NotificationHandler {
    pub fn new(notifier: Arc<dyn Notifier>, processed: Arc<dyn ProcessedEffects>) -> Self {
        Self {
            notifier,
            processed,
        }
    }
}

#[async_trait]
impl EffectHandler for NotificationHandler {
    fn effect(&self) -> EffectType {
        EffectType::Notification
    }

    #[tracing::instrument(skip(self, event), fields(order_id = %event.order_id))]
    async fn handle(&self, event: &OrderCreatedEvent) -> Result<EffectOutcome, ProcessingError> {
        let key = event.effect_key(EffectType::Notification);
        if self.processed.contains(key).await? {
            tracing::debug!("notification already sent");
            return Ok(EffectOutcome::Duplicate);
        }

        self.notifier.send(event).await?;
        self.processed.record(key).await?;
        metrics::counter!("notifications_sent_total").increment(1);
        Ok(EffectOutcome::Applied)
    }
}
