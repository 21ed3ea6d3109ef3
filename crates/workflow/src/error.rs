//! Order placement error types.

use common::ProductId;
use orders::OrderError;
use thiserror::Error;

/// Reasons an order could not be placed or read.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The request is malformed; not retried.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The product-owning service reported the product absent.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The requested quantity exceeds the reported stock.
    #[error("Insufficient stock for {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// The product lookup failed or timed out; not retried in the request.
    #[error("Product service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The order ledger failed; nothing was published.
    #[error("Order persistence failed: {0}")]
    Persistence(#[from] OrderError),
}

impl WorkflowError {
    /// Metric label for the rejection reason.
    pub fn reason(&self) -> &'static str {
        match self {
            WorkflowError::InvalidRequest(_) => "invalid_request",
            WorkflowError::ProductNotFound(_) => "product_not_found",
            WorkflowError::InsufficientStock { .. } => "insufficient_stock",
            WorkflowError::UpstreamUnavailable(_) => "upstream_unavailable",
            WorkflowError::Persistence(_) => "persistence",
        }
    }
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;
