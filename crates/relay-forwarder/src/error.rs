//! Forwarder error types.

use relay_buffer::StorageError;
use std::time::Duration;
use thiserror::Error;

/// A single failed delivery attempt.
///
/// Every variant is transient from the engine's point of view and consumes
/// one retry attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The attempt did not complete in time
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed to reach the destination
    #[error("Transport error: {0}")]
    Transport(String),

    /// The destination refused the message
    #[error("Rejected by sink: {0}")]
    Rejected(String),

    /// The sink was closed
    #[error("Sink closed")]
    Closed,
}

/// Forwarder error type.
#[derive(Error, Debug)]
pub enum ForwardError {
    /// Fetching the pending batch failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// start() was called on a running engine
    #[error("Forwarding engine already started")]
    AlreadyStarted,

    /// start() was called after stop()
    #[error("Forwarding engine is stopped")]
    Stopped,
}

/// Result type alias using ForwardError.
pub type ForwardResult<T> = Result<T, ForwardError>;
