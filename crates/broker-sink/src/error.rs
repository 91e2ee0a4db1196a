//! Sink construction errors.

use thiserror::Error;

/// Errors raised while building a sink.
///
/// Per-message delivery failures are reported as
/// [`relay_forwarder::DeliveryError`] instead.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Invalid sink URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Sink configuration error: {0}")]
    Config(String),
}

/// Result type alias using SinkError.
pub type SinkResult<T> = Result<T, SinkError>;
