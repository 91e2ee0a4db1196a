//! Prometheus metrics for the edge relay.
//!
//! Metrics live in a registry owned by [`RelayMetrics`] rather than the
//! prometheus default registry, so each relay (and each test) gets its own:
//! - `iot_enqueue_total`: messages accepted into the buffer
//! - `iot_forwarded_total`: messages delivered to the sink
//! - `iot_forward_failed_total`: messages that exhausted their retries
//! - `iot_buffer_pending`: messages waiting in the buffer

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use relay_buffer::{MessageId, QueueObserver};
use relay_forwarder::ForwardObserver;
use thiserror::Error;

/// Content type of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Metrics error type.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics output is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Result type alias using MetricsError.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Relay counters and gauges backed by a private registry.
#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,
    enqueued: IntCounter,
    forwarded: IntCounter,
    forward_failed: IntCounter,
    pending: IntGauge,
}

impl RelayMetrics {
    /// Create and register all relay metrics.
    pub fn new() -> MetricsResult<Self> {
        let registry = Registry::new();

        let enqueued = IntCounter::with_opts(Opts::new(
            "iot_enqueue_total",
            "Total messages enqueued into the buffer",
        ))?;
        let forwarded = IntCounter::with_opts(Opts::new(
            "iot_forwarded_total",
            "Total messages forwarded to the sink",
        ))?;
        let forward_failed = IntCounter::with_opts(Opts::new(
            "iot_forward_failed_total",
            "Total messages that failed forwarding after retries",
        ))?;
        let pending = IntGauge::with_opts(Opts::new(
            "iot_buffer_pending",
            "Messages currently pending in the buffer",
        ))?;

        registry.register(Box::new(enqueued.clone()))?;
        registry.register(Box::new(forwarded.clone()))?;
        registry.register(Box::new(forward_failed.clone()))?;
        registry.register(Box::new(pending.clone()))?;

        Ok(Self {
            registry,
            enqueued,
            forwarded,
            forward_failed,
            pending,
        })
    }

    /// Seed the pending gauge, e.g. from the buffer at startup.
    pub fn set_pending(&self, count: u64) {
        self.pending.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> MetricsResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn enqueued_total(&self) -> u64 {
        self.enqueued.get()
    }

    pub fn forwarded_total(&self) -> u64 {
        self.forwarded.get()
    }

    pub fn forward_failed_total(&self) -> u64 {
        self.forward_failed.get()
    }

    pub fn pending(&self) -> i64 {
        self.pending.get()
    }
}

impl QueueObserver for RelayMetrics {
    fn enqueued(&self, _id: MessageId) {
        self.enqueued.inc();
        self.pending.inc();
    }

    fn marked_sent(&self, count: usize) {
        self.pending
            .sub(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

impl ForwardObserver for RelayMetrics {
    fn forwarded(&self, _id: MessageId) {
        self.forwarded.inc();
    }

    fn forward_failed(&self, _id: MessageId) {
        self.forward_failed.inc();
    }

    fn pending(&self, count: u64) {
        self.set_pending(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_buffer::PersistentQueue;
    use relay_forwarder::{DeliveryError, ForwarderConfig, ForwardingEngine, Sink};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_render_contains_all_metrics() {
        let metrics = RelayMetrics::new().unwrap();
        let output = metrics.render().unwrap();

        assert!(output.contains("iot_enqueue_total 0"));
        assert!(output.contains("iot_forwarded_total 0"));
        assert!(output.contains("iot_forward_failed_total 0"));
        assert!(output.contains("iot_buffer_pending 0"));
        assert!(output.contains("# TYPE iot_buffer_pending gauge"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = RelayMetrics::new().unwrap();
        let second = RelayMetrics::new().unwrap();

        QueueObserver::enqueued(&first, 1);
        assert_eq!(first.enqueued_total(), 1);
        assert_eq!(second.enqueued_total(), 0);
    }

    #[test]
    fn test_queue_hooks_track_pending() {
        let metrics = RelayMetrics::new().unwrap();
        for id in 1..=5 {
            QueueObserver::enqueued(&metrics, id);
        }
        metrics.marked_sent(3);

        assert_eq!(metrics.enqueued_total(), 5);
        assert_eq!(metrics.pending(), 2);
    }

    #[tokio::test]
    async fn test_repeated_mark_sent_keeps_pending_gauge() {
        let metrics = Arc::new(RelayMetrics::new().unwrap());
        let queue = PersistentQueue::open_in_memory_with_observer(metrics.clone())
            .await
            .unwrap();
        let a = queue.enqueue(b"a".to_vec()).await.unwrap();
        let b = queue.enqueue(b"b".to_vec()).await.unwrap();
        queue.enqueue(b"c".to_vec()).await.unwrap();

        queue.mark_sent(&[a, b]).await.unwrap();
        queue.mark_sent(&[a, b]).await.unwrap();
        queue.mark_sent(&[a]).await.unwrap();

        assert_eq!(metrics.pending(), 1);
        assert_eq!(queue.count_pending().await.unwrap(), 1);
    }

    #[test]
    fn test_pending_hook_overrides_gauge() {
        let metrics = RelayMetrics::new().unwrap();
        QueueObserver::enqueued(&metrics, 1);
        ForwardObserver::pending(&metrics, 42);
        assert_eq!(metrics.pending(), 42);
    }

    struct RejectSecond;

    #[async_trait]
    impl Sink for RejectSecond {
        async fn send(&self, payload: &[u8], _timeout: Duration) -> Result<(), DeliveryError> {
            if payload == b"second" {
                Err(DeliveryError::Rejected("no".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_metrics_follow_queue_and_engine() {
        let metrics = Arc::new(RelayMetrics::new().unwrap());
        let queue = PersistentQueue::open_in_memory_with_observer(metrics.clone())
            .await
            .unwrap();
        queue.enqueue(b"first".to_vec()).await.unwrap();
        queue.enqueue(b"second".to_vec()).await.unwrap();
        assert_eq!(metrics.pending(), 2);

        let config = ForwarderConfig {
            retries: 1,
            backoff_base: Duration::from_millis(1),
            ..Default::default()
        };
        let engine =
            ForwardingEngine::with_observer(queue, Arc::new(RejectSecond), config, metrics.clone());
        engine.flush_once().await.unwrap();

        assert_eq!(metrics.enqueued_total(), 2);
        assert_eq!(metrics.forwarded_total(), 1);
        assert_eq!(metrics.forward_failed_total(), 1);
        assert_eq!(metrics.pending(), 1);

        let output = metrics.render().unwrap();
        assert!(output.contains("iot_forwarded_total 1"));
        assert!(output.contains("iot_buffer_pending 1"));
    }
}
