//! Relay composition.

use crate::app::metrics_server::MetricsServer;
use crate::app::shutdown::wait_for_shutdown_signal;
use crate::app::sink::build_sink;
use mqtt_source::{MqttSource, MqttSourceConfig};
use relay_buffer::PersistentQueue;
use relay_config_and_utils::{Config, Paths};
use relay_forwarder::{ForwardingEngine, Sink};
use relay_metrics::RelayMetrics;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A running relay: buffer, forwarder, MQTT source and metrics server.
pub struct Relay {
    queue: PersistentQueue,
    metrics: Arc<RelayMetrics>,
    sink: Option<Arc<dyn Sink>>,
    engine: Option<ForwardingEngine>,
    source: Option<MqttSource>,
    metrics_server: MetricsServer,
}

impl Relay {
    /// Build and start every component.
    ///
    /// Failing to open the buffer aborts startup.
    pub async fn start(config: Config, paths: Paths) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Starting edge relay");
        paths.ensure_dirs()?;

        let metrics = Arc::new(RelayMetrics::new()?);

        let buffer_path = config.buffer.resolve_path(&paths);
        let queue = PersistentQueue::open_with_observer(&buffer_path, metrics.clone()).await?;
        let pending = queue.count_pending().await?;
        metrics.set_pending(pending);
        info!(path = %buffer_path.display(), pending, "Buffer opened");

        let forwarder_config = config.buffer.forwarder_config();
        let sink = build_sink(&config.sink, forwarder_config.timeout)?;

        let engine = match &sink {
            Some(sink) => {
                let engine = ForwardingEngine::with_observer(
                    queue.clone(),
                    sink.clone(),
                    forwarder_config,
                    metrics.clone(),
                );
                engine.start().await?;
                Some(engine)
            }
            None => {
                warn!("Sink not configured; forwarder disabled");
                None
            }
        };

        let source = match config.mqtt.broker.clone().filter(|_| config.mqtt.is_enabled()) {
            Some(broker) => Some(
                MqttSource::connect(
                    MqttSourceConfig {
                        broker,
                        topic: config.mqtt.topic.clone(),
                        client_id: config.mqtt.client_id.clone(),
                        qos: config.mqtt.qos,
                    },
                    queue.clone(),
                )
                .await?,
            ),
            None => {
                warn!("MQTT broker not configured; ingestion disabled");
                None
            }
        };

        let metrics_server =
            MetricsServer::start(config.server.metrics_addr()?, metrics.clone()).await?;

        info!("Edge relay running");
        Ok(Self {
            queue,
            metrics,
            sink,
            engine,
            source,
            metrics_server,
        })
    }

    pub fn queue(&self) -> &PersistentQueue {
        &self.queue
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics_server.local_addr()
    }

    /// Stop components in dependency order: forwarder, source, sink,
    /// buffer, metrics server.
    pub async fn shutdown(self) {
        info!("Shutting down edge relay");

        if let Some(engine) = &self.engine {
            engine.stop().await;
        }
        if let Some(source) = &self.source {
            source.close().await;
        }
        if let Some(sink) = &self.sink {
            sink.close().await;
        }

        // Release the other handles so close() is the last user of the buffer.
        drop(self.engine);
        drop(self.source);
        if let Err(e) = self.queue.close().await {
            error!(error = %e, "Failed to close buffer");
        }

        self.metrics_server.shutdown().await;
        info!("Edge relay stopped");
    }
}

/// Run the relay until Ctrl-C or SIGTERM.
pub async fn run_relay(config: Config, paths: Paths) -> Result<(), Box<dyn std::error::Error>> {
    let relay = Relay::start(config, paths).await?;
    wait_for_shutdown_signal().await;
    relay.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(sink_url: Option<String>) -> Config {
        let mut config = Config::default();
        config.server.metrics_addr = "127.0.0.1:0".to_string();
        config.buffer.flush_interval_secs = 1;
        config.buffer.timeout_ms = 1000;
        config.sink.url = sink_url;
        config
    }

    #[tokio::test]
    async fn test_relay_forwards_buffered_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let relay = Relay::start(test_config(Some(server.uri())), paths.clone())
            .await
            .unwrap();

        relay.queue().enqueue(b"t=21.5".to_vec()).await.unwrap();
        relay.queue().enqueue(b"t=21.7".to_vec()).await.unwrap();

        for _ in 0..50 {
            if relay.queue().count_pending().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(relay.queue().count_pending().await.unwrap(), 0);
        assert_eq!(relay.metrics().forwarded_total(), 2);
        assert_eq!(relay.metrics().pending(), 0);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].body, b"t=21.5");
        assert_eq!(received[1].body, b"t=21.7");

        relay.shutdown().await;
        assert!(paths.buffer_file().exists());
    }

    #[tokio::test]
    async fn test_relay_without_sink_keeps_messages() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let relay = Relay::start(test_config(None), paths.clone()).await.unwrap();
        relay.queue().enqueue(b"held".to_vec()).await.unwrap();
        relay.shutdown().await;

        let relay = Relay::start(test_config(None), paths).await.unwrap();
        assert_eq!(relay.queue().count_pending().await.unwrap(), 1);
        assert_eq!(relay.metrics().pending(), 1);
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_relay_fails_on_unusable_buffer_path() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        // A directory where the database file should be.
        let mut config = test_config(None);
        config.buffer.path = Some(dir.path().to_path_buf());
        assert!(Relay::start(config, paths).await.is_err());
    }
}
