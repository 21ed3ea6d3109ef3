use thiserror::Error;

/// Errors that can occur when talking to the message broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Could not establish a connection or channel.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The broker is not reachable right now.
    #[error("Broker unavailable")]
    Unavailable,

    /// Declaring an exchange or queue failed.
    #[error("Declaration of '{name}' failed: {reason}")]
    Declare { name: String, reason: String },

    /// Publishing a message failed.
    #[error("Publish to '{exchange}' failed: {reason}")]
    Publish { exchange: String, reason: String },

    /// The broker accepted the message but no queue was bound to receive it.
    #[error("Publish to '{exchange}' was unroutable: {reason}")]
    Unroutable { exchange: String, reason: String },

    /// Starting a consumer failed.
    #[error("Consume from '{queue}' failed: {reason}")]
    Consume { queue: String, reason: String },

    /// Acknowledging, retrying or dead-lettering a delivery failed.
    #[error("Acknowledgement failed: {0}")]
    Acknowledge(String),

    /// Reconnection gave up after the configured number of attempts.
    #[error("Gave up connecting after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Underlying AMQP client error.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
