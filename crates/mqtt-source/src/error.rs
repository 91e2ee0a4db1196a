//! MQTT source error types.

use thiserror::Error;

/// MQTT source error type.
#[derive(Error, Debug)]
pub enum MqttSourceError {
    #[error("Invalid broker URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid broker address: {0}")]
    InvalidBroker(String),

    #[error("Unsupported QoS level: {0}")]
    UnsupportedQos(u8),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Result type alias using MqttSourceError.
pub type MqttSourceResult<T> = Result<T, MqttSourceError>;
