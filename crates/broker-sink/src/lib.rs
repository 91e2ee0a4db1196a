//! Outbound sinks for the edge relay.
//!
//! - [`HttpSink`]: POSTs each raw payload to an HTTP endpoint
//! - `KafkaSink` (feature `kafka`): produces each payload to a topic with `acks=all`

mod error;
mod http;
#[cfg(feature = "kafka")]
mod kafka;

pub use error::{SinkError, SinkResult};
pub use http::HttpSink;
#[cfg(feature = "kafka")]
pub use kafka::{KafkaSink, KafkaSinkConfig};
