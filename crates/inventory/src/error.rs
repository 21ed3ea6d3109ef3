use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with the inventory ledger.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// No product with the given ID exists.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A product with the given ID already exists.
    #[error("Product already exists: {0}")]
    AlreadyExists(ProductId),

    /// The request violates a product invariant.
    #[error("Invalid product: {0}")]
    Invalid(String),

    /// The ledger cannot be reached right now.
    #[error("Inventory ledger unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be mapped back to a product.
    #[error("Corrupt product row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl InventoryError {
    /// Returns true if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InventoryError::Unavailable(_) | InventoryError::Database(_)
        )
    }
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
