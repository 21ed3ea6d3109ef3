//! Product service: owns the catalogue and applies stock decrements.

use std::sync::Arc;

use api::{Config, ProductState, Service, ServiceInfo, StartupError, server, telemetry};
use broker::{AmqpConnector, QueueBinding, STOCK_UPDATE_QUEUE};
use consumers::{StockDecrementHandler, Worker};
use inventory::{
    InMemoryInventoryLedger, InventoryLedger, InventoryLedgerExt, PgInventoryLedger,
    default_catalogue,
};
use tracing::Instrument;

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = Config::from_env(Service::Product);
    let _telemetry = telemetry::init_tracing(&config)?;
    let metrics_handle = telemetry::install_metrics()?;
    let span = telemetry::service_span(&config);

    async move {
        let ledger: Arc<dyn InventoryLedger> = match server::connect_database(&config).await? {
            Some(pool) => Arc::new(PgInventoryLedger::new(pool)),
            None => Arc::new(InMemoryInventoryLedger::new()),
        };

        if config.seed_products {
            ledger.seed_if_empty(default_catalogue()).await?;
        }

        let worker = Worker::new(
            STOCK_UPDATE_QUEUE,
            Arc::new(StockDecrementHandler::new(ledger.clone())),
            config.redelivery_policy(),
        );
        let consumer = server::spawn_worker(
            worker,
            Arc::new(AmqpConnector::new(config.rabbitmq_uri.clone())),
            QueueBinding::stock_updates(),
            config.reconnect_policy(),
        );

        let app = api::create_product_app(
            ProductState::new(ledger),
            ServiceInfo::from_config(&config),
            metrics_handle,
        );

        let result = server::serve(&config, app).await;
        consumer.abort();
        result
    }
    .instrument(span)
    .await
}
