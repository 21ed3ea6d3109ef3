//! Notification service: sends one confirmation per created order.

use std::sync::Arc;

use api::{Config, Service, ServiceInfo, StartupError, server, telemetry};
use broker::{AmqpConnector, MAIL_NOTIFICATION_QUEUE, QueueBinding};
use consumers::{
    InMemoryProcessedEffects, LogNotifier, NotificationHandler, PgProcessedEffects,
    ProcessedEffects, Worker,
};
use tracing::Instrument;

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = Config::from_env(Service::Notification);
    let _telemetry = telemetry::init_tracing(&config)?;
    let metrics_handle = telemetry::install_metrics()?;
    let span = telemetry::service_span(&config);

    async move {
        let processed: Arc<dyn ProcessedEffects> = match server::connect_database(&config).await? {
            Some(pool) => Arc::new(PgProcessedEffects::new(pool)),
            None => Arc::new(InMemoryProcessedEffects::new()),
        };

        let worker = Worker::new(
            MAIL_NOTIFICATION_QUEUE,
            Arc::new(NotificationHandler::new(Arc::new(LogNotifier), processed)),
            config.redelivery_policy(),
        );
        let consumer = server::spawn_worker(
            worker,
            Arc::new(AmqpConnector::new(config.rabbitmq_uri.clone())),
            QueueBinding::mail_notifications(),
            config.reconnect_policy(),
        );

        let app = api::create_notification_app(ServiceInfo::from_config(&config), metrics_handle);

        let result = server::serve(&config, app).await;
        consumer.abort();
        result
    }
    .instrument(span)
    .await
}
