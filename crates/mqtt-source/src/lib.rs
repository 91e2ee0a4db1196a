//! MQTT ingestion for the edge relay.
//!
//! [`MqttSource`] subscribes to a topic filter and enqueues every inbound
//! publish into the persistent queue. Payloads are stored as received.

mod broker;
mod error;
mod source;

pub use broker::{qos_from_level, BrokerAddress, DEFAULT_MQTT_PORT};
pub use error::{MqttSourceError, MqttSourceResult};
pub use source::{ingest, MqttSource, MqttSourceConfig};
