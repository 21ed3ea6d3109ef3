//! HTTP services for order placement.
//!
//! Three routers, one per deployable service:
//! - [`create_order_app`]: `/orders`, backed by the order workflow
//! - [`create_product_app`]: `/products`, backed by the inventory ledger
//! - [`create_notification_app`]: health and metrics only
//!
//! Every router serves `/health` and `/metrics` and carries the same CORS
//! and tracing layers; request spans continue the caller's W3C trace.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, put};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat, OtlpConfig, Service};
pub use error::{ApiError, StartupError};
pub use state::{OrderState, ProductState, ServiceInfo};

/// Creates the order service router.
pub fn create_order_app(
    state: Arc<OrderState>,
    info: ServiceInfo,
    metrics_handle: PrometheusHandle,
) -> Router {
    let orders = Router::new()
        .route(
            "/orders",
            get(routes::orders::list).post(routes::orders::create),
        )
        .route("/orders/{id}", get(routes::orders::get))
        .route_layer(middleware::from_fn(routes::metrics::track))
        .with_state(state);

    with_common_layers(orders.merge(observability_router(info, metrics_handle)))
}

/// Creates the product service router.
pub fn create_product_app(
    state: Arc<ProductState>,
    info: ServiceInfo,
    metrics_handle: PrometheusHandle,
) -> Router {
    let products = Router::new()
        .route(
            "/products",
            get(routes::products::list).post(routes::products::create),
        )
        .route("/products/{id}", get(routes::products::get))
        .route("/products/{id}/stock", put(routes::products::update_stock))
        .route_layer(middleware::from_fn(routes::metrics::track))
        .with_state(state);

    with_common_layers(products.merge(observability_router(info, metrics_handle)))
}

/// Creates the notification service router.
pub fn create_notification_app(info: ServiceInfo, metrics_handle: PrometheusHandle) -> Router {
    with_common_layers(observability_router(info, metrics_handle))
}

fn observability_router(info: ServiceInfo, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .with_state(info)
        .merge(metrics_router)
}

fn with_common_layers(router: Router) -> Router {
    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http().make_span_with(telemetry::request_span))
}
