//! Order service: places orders and publishes `order.created`.

use std::sync::Arc;

use api::{Config, OrderState, Service, ServiceInfo, StartupError, server, telemetry};
use broker::{AmqpConnector, EventPublisher, ORDER_EVENTS_EXCHANGE};
use orders::{InMemoryOrderLedger, OrderLedger, PgOrderLedger};
use tracing::Instrument;
use workflow::{HttpProductCatalog, OrderWorkflow};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = Config::from_env(Service::Order);
    let _telemetry = telemetry::init_tracing(&config)?;
    let metrics_handle = telemetry::install_metrics()?;
    let span = telemetry::service_span(&config);

    async move {
        let ledger: Arc<dyn OrderLedger> = match server::connect_database(&config).await? {
            Some(pool) => Arc::new(PgOrderLedger::new(pool)),
            None => Arc::new(InMemoryOrderLedger::new()),
        };

        let catalog = HttpProductCatalog::new(&config.product_service_url, config.upstream_timeout)?;
        tracing::info!(url = %config.product_service_url, "using product service");

        let publisher = EventPublisher::new(ORDER_EVENTS_EXCHANGE);
        let supervisor = publisher.spawn_supervisor(
            Arc::new(AmqpConnector::new(config.rabbitmq_uri.clone())),
            config.reconnect_policy(),
        );

        let workflow = OrderWorkflow::new(Arc::new(catalog), ledger, publisher);
        let app = api::create_order_app(
            OrderState::new(workflow),
            ServiceInfo::from_config(&config),
            metrics_handle,
        );

        let result = server::serve(&config, app).await;
        supervisor.abort();
        result
    }
    .instrument(span)
    .await
}
