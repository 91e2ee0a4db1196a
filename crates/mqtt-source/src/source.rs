//! MQTT subscriber feeding the persistent queue.

use crate::{qos_from_level, BrokerAddress, MqttSourceResult};
use relay_buffer::{MessageId, PersistentQueue};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound for writing the queued unsubscribe and disconnect on close.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// MQTT subscription settings.
#[derive(Debug, Clone)]
pub struct MqttSourceConfig {
    /// Broker URL, e.g. `tcp://localhost:1883`.
    pub broker: String,
    /// Topic filter to subscribe to.
    pub topic: String,
    /// Client id; a random `edge-relay-<uuid>` id is used when unset.
    pub client_id: Option<String>,
    /// QoS level: 0, 1 or 2.
    pub qos: u8,
}

/// Enqueue one inbound payload.
///
/// A storage failure drops the message; it is logged, not retried.
pub async fn ingest(queue: &PersistentQueue, topic: &str, payload: Vec<u8>) -> Option<MessageId> {
    let len = payload.len();
    match queue.enqueue(payload).await {
        Ok(id) => {
            debug!(id, topic = %topic, bytes = len, "Enqueued message");
            Some(id)
        }
        Err(e) => {
            error!(topic = %topic, bytes = len, error = %e, "Failed to enqueue message, dropping");
            None
        }
    }
}

struct Running {
    /// `true` asks the loop to flush the queued disconnect before exiting.
    shutdown_tx: oneshot::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Subscribed MQTT client driving its event loop in a background task.
pub struct MqttSource {
    client: AsyncClient,
    topic: String,
    running: Mutex<Option<Running>>,
}

impl MqttSource {
    /// Create the client, subscribe on every (re)connect and start ingesting.
    ///
    /// Fails only on invalid settings; the connection itself is established
    /// and retried by the background task.
    pub async fn connect(config: MqttSourceConfig, queue: PersistentQueue) -> MqttSourceResult<Self> {
        let address = BrokerAddress::parse(&config.broker)?;
        let qos = qos_from_level(config.qos)?;

        let client_id = config
            .client_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("edge-relay-{}", uuid::Uuid::new_v4()));

        let mut options = MqttOptions::new(client_id.clone(), address.host.clone(), address.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let (Some(username), Some(password)) = (&address.username, &address.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            config.topic.clone(),
            qos,
            queue,
            shutdown_rx,
        ));

        info!(
            host = %address.host,
            port = address.port,
            client_id = %client_id,
            topic = %config.topic,
            "MQTT source started"
        );

        Ok(Self {
            client,
            topic: config.topic,
            running: Mutex::new(Some(Running {
                shutdown_tx,
                handle,
            })),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Unsubscribe, disconnect and stop the event loop task. Idempotent.
    ///
    /// The task keeps polling until the disconnect has been written to the
    /// broker, the connection fails, or `DRAIN_TIMEOUT` passes.
    pub async fn close(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        if let Err(e) = self.client.try_unsubscribe(self.topic.clone()) {
            debug!(error = %e, "MQTT unsubscribe not queued");
        }
        let disconnect_queued = match self.client.try_disconnect() {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "MQTT disconnect not queued");
                false
            }
        };

        let _ = running.shutdown_tx.send(disconnect_queued);
        let mut handle = running.handle;
        match tokio::time::timeout(CLOSE_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "MQTT event loop task failed"),
            Err(_) => {
                warn!("MQTT event loop did not stop in time, aborting");
                handle.abort();
            }
        }

        info!(topic = %self.topic, "MQTT source closed");
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    topic: String,
    qos: QoS,
    queue: PersistentQueue,
    mut shutdown_rx: oneshot::Receiver<bool>,
) {
    let mut connected = false;
    // Set once close is requested while connected.
    let mut drain_deadline: Option<Instant> = None;

    loop {
        let event = match drain_deadline {
            None => tokio::select! {
                biased;
                drain = &mut shutdown_rx => {
                    if connected && drain.unwrap_or(false) {
                        drain_deadline = Some(Instant::now() + DRAIN_TIMEOUT);
                        continue;
                    }
                    break;
                }
                event = event_loop.poll() => event,
            },
            Some(deadline) => tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    warn!("MQTT disconnect not flushed in time");
                    break;
                }
                event = event_loop.poll() => event,
            },
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected = true;
                if drain_deadline.is_some() {
                    continue;
                }
                info!(topic = %topic, "Connected to MQTT broker, subscribing");
                if let Err(e) = client.try_subscribe(topic.clone(), qos) {
                    error!(topic = %topic, error = %e, "Failed to queue MQTT subscribe");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                ingest(&queue, &publish.topic, publish.payload.to_vec()).await;
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                debug!(pkid = ack.pkid, "MQTT subscription acknowledged");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) if drain_deadline.is_some() => {
                debug!(error = %e, "MQTT connection closed while disconnecting");
                break;
            }
            Err(e) => {
                connected = false;
                warn!(error = %e, "MQTT connection error, retrying");
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }

    debug!("MQTT event loop stopped");
}
