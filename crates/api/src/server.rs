//! Process lifecycle helpers shared by the service binaries.

use std::sync::Arc;

use axum::Router;
use broker::{Connector, QueueBinding, ReconnectPolicy};
use consumers::Worker;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::Config;
use crate::error::StartupError;

/// Connects to PostgreSQL and applies migrations when `DATABASE_URL` is set.
///
/// Returns `None` when no database is configured; callers then fall back to
/// in-memory ledgers.
pub async fn connect_database(config: &Config) -> Result<Option<PgPool>, StartupError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory ledgers");
        return Ok(None);
    };

    let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("database connected and migrated");
    Ok(Some(pool))
}

/// Runs `worker` against `binding` for the lifetime of the process.
///
/// The task inherits the caller's span, so consumer logs carry the
/// service and instance fields.
pub fn spawn_worker(
    worker: Worker,
    connector: Arc<dyn Connector>,
    binding: QueueBinding,
    reconnect: ReconnectPolicy,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            if let Err(e) = worker.run_supervised(connector, binding, reconnect).await {
                tracing::error!(queue = worker.queue(), error = %e, "worker stopped");
            }
        }
        .in_current_span(),
    )
}

/// Binds `config.addr()` and serves `app` until SIGINT or SIGTERM.
pub async fn serve(config: &Config, app: Router) -> Result<(), StartupError> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, service = config.service.name(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}
