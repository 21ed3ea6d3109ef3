use broker::BrokerError;
use inventory::InventoryError;
use thiserror::Error;

/// Failure while applying an effect, classified for the redelivery policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    /// May succeed if the message is tried again later.
    #[error("transient: {0}")]
    Transient(String),

    /// Will fail the same way every time.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl ProcessingError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProcessingError::Transient(_))
    }
}

impl From<InventoryError> for ProcessingError {
    fn from(e: InventoryError) -> Self {
        if e.is_transient() {
            ProcessingError::Transient(e.to_string())
        } else {
            ProcessingError::Permanent(e.to_string())
        }
    }
}

impl From<sqlx::Error> for ProcessingError {
    fn from(e: sqlx::Error) -> Self {
        ProcessingError::Transient(e.to_string())
    }
}

/// Errors that stop a worker loop.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Settling a delivery or (re)connecting failed.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;
