//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::InventoryError;
use thiserror::Error;
use workflow::{CatalogError, WorkflowError};

/// API-level error type that maps to HTTP responses.
///
/// Every error renders as `{"error": <message>, "code": <kind>}`.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Resource not found.
    NotFound(String),
    /// Order placement error.
    Workflow(WorkflowError),
    /// Inventory ledger error.
    Inventory(InventoryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut extra = serde_json::Map::new();
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "InvalidRequest", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NotFound", msg),
            ApiError::Workflow(err) => workflow_error_to_response(err, &mut extra),
            ApiError::Inventory(err) => inventory_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, code, "request failed");
        }

        let mut body = serde_json::Map::new();
        body.insert("error".to_string(), message.into());
        body.insert("code".to_string(), code.into());
        body.extend(extra);
        (status, axum::Json(serde_json::Value::Object(body))).into_response()
    }
}

fn workflow_error_to_response(
    err: WorkflowError,
    extra: &mut serde_json::Map<String, serde_json::Value>,
) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        WorkflowError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest", message),
        WorkflowError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "ProductNotFound", message),
        WorkflowError::InsufficientStock {
            available,
            requested,
            ..
        } => {
            extra.insert("available".to_string(), available.into());
            extra.insert("requested".to_string(), requested.into());
            (StatusCode::BAD_REQUEST, "InsufficientStock", message)
        }
        WorkflowError::UpstreamUnavailable(_) => {
            (StatusCode::BAD_GATEWAY, "UpstreamUnavailable", message)
        }
        WorkflowError::Persistence(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "PersistenceError",
            message,
        ),
    }
}

fn inventory_error_to_response(err: InventoryError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        InventoryError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "ProductNotFound", message),
        InventoryError::AlreadyExists(_) => (StatusCode::CONFLICT, "Conflict", message),
        InventoryError::Invalid(_) => (StatusCode::BAD_REQUEST, "InvalidRequest", message),
        InventoryError::Unavailable(_)
        | InventoryError::Corrupt(_)
        | InventoryError::Database(_)
        | InventoryError::Migration(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "PersistenceError",
            message,
        ),
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Errors that stop a service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to bind or serve: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Product catalogue error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Metrics recorder error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Tracing setup error: {0}")]
    Telemetry(String),
}
