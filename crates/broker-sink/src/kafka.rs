//! Kafka sink built on an rdkafka `FutureProducer`.

use crate::{SinkError, SinkResult};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use relay_forwarder::{DeliveryError, Sink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka sink settings.
#[derive(Debug, Clone)]
pub struct KafkaSinkConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub client_id: Option<String>,
    /// Upper bound librdkafka spends delivering one message.
    pub message_timeout: Duration,
}

/// Sink producing each payload to a Kafka topic.
///
/// Uses `acks=all`: a send succeeds once every in-sync replica has the
/// record.
pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
    closed: AtomicBool,
}

impl KafkaSink {
    pub fn new(config: &KafkaSinkConfig) -> SinkResult<Self> {
        if config.brokers.is_empty() {
            return Err(SinkError::Config("kafka brokers required".to_string()));
        }
        if config.topic.is_empty() {
            return Err(SinkError::Config("kafka topic required".to_string()));
        }

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", config.brokers.join(","))
            .set("acks", "all")
            .set(
                "message.timeout.ms",
                config.message_timeout.as_millis().max(1).to_string(),
            );
        if let Some(client_id) = config.client_id.as_deref().filter(|id| !id.is_empty()) {
            client_config.set("client.id", client_id);
        }

        let producer: FutureProducer = client_config.create()?;

        info!(
            brokers = %config.brokers.join(","),
            topic = %config.topic,
            "Kafka producer created"
        );

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

fn delivery_error(err: KafkaError, timeout: Duration) -> DeliveryError {
    match err {
        KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut)
        | KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => {
            DeliveryError::Timeout(timeout)
        }
        KafkaError::MessageProduction(
            code @ (RDKafkaErrorCode::MessageSizeTooLarge
            | RDKafkaErrorCode::TopicAuthorizationFailed
            | RDKafkaErrorCode::InvalidRecord),
        ) => DeliveryError::Rejected(code.to_string()),
        other => DeliveryError::Transport(other.to_string()),
    }
}

#[async_trait]
impl Sink for KafkaSink {
    async fn send(&self, payload: &[u8], timeout: Duration) -> Result<(), DeliveryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeliveryError::Closed);
        }

        let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(payload);
        match tokio::time::timeout(timeout, self.producer.send(record, Timeout::After(timeout)))
            .await
        {
            Ok(Ok(delivery)) => {
                debug!(topic = %self.topic, delivery = ?delivery, "Payload produced");
                Ok(())
            }
            Ok(Err((err, _))) => Err(delivery_error(err, timeout)),
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let producer = self.producer.clone();
        let flushed =
            tokio::task::spawn_blocking(move || producer.flush(Timeout::After(CLOSE_FLUSH_TIMEOUT)))
                .await;
        match flushed {
            Ok(Ok(())) => info!(topic = %self.topic, "Kafka producer flushed"),
            Ok(Err(e)) => warn!(error = %e, "Kafka producer flush failed"),
            Err(e) => warn!(error = %e, "Kafka flush task failed"),
        }
    }
}
