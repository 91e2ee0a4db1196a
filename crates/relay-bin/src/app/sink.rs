//! Sink selection from configuration.

use broker_sink::{HttpSink, SinkError};
use relay_config_and_utils::{SinkConfig, SinkKind};
use relay_forwarder::Sink;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured sink, or `None` when no destination is set.
///
/// `timeout` bounds broker-side delivery for transports that need it.
pub fn build_sink(
    config: &SinkConfig,
    timeout: Duration,
) -> Result<Option<Arc<dyn Sink>>, SinkError> {
    if !config.is_enabled() {
        return Ok(None);
    }

    match config.kind {
        SinkKind::Http => {
            let url = config.url.as_deref().unwrap_or_default();
            let sink: Arc<dyn Sink> = Arc::new(HttpSink::new(url)?);
            Ok(Some(sink))
        }
        SinkKind::Kafka => build_kafka_sink(config, timeout),
    }
}

#[cfg(feature = "kafka")]
fn build_kafka_sink(
    config: &SinkConfig,
    timeout: Duration,
) -> Result<Option<Arc<dyn Sink>>, SinkError> {
    use broker_sink::{KafkaSink, KafkaSinkConfig};

    let sink = KafkaSink::new(&KafkaSinkConfig {
        brokers: config.brokers.clone(),
        topic: config.topic.clone(),
        client_id: config.client_id.clone(),
        message_timeout: timeout,
    })?;
    let sink: Arc<dyn Sink> = Arc::new(sink);
    Ok(Some(sink))
}

#[cfg(not(feature = "kafka"))]
fn build_kafka_sink(
    _config: &SinkConfig,
    _timeout: Duration,
) -> Result<Option<Arc<dyn Sink>>, SinkError> {
    Err(SinkError::Config(
        "kafka sink requested but edge-relay was built without the `kafka` feature".to_string(),
    ))
}
