use thiserror::Error;

/// Errors that can occur when interacting with the order ledger.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order violates an invariant and was not stored.
    #[error("Invalid order: {0}")]
    Invalid(String),

    /// The ledger cannot be reached right now.
    #[error("Order ledger unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back to an order.
    #[error("Corrupt order row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order ledger operations.
pub type Result<T> = std::result::Result<T, OrderError>;
