//! Timer-driven forwarding engine.

use crate::{
    compute_backoff, DeliveryError, ForwardError, ForwardObserver, ForwardResult, ForwarderConfig,
    NullForwardObserver, Sink,
};
use relay_buffer::{Message, MessageId, PersistentQueue, StorageError};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Message that exhausted its delivery attempts and halted a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledMessage {
    /// Id of the message that stopped the batch.
    pub id: MessageId,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Error from the last attempt.
    pub last_error: DeliveryError,
}

/// Outcome of one flush.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Number of pending messages fetched.
    pub fetched: usize,
    /// Ids delivered to the sink, in delivery order.
    pub delivered: Vec<MessageId>,
    /// Message that halted the batch, if any.
    pub stalled: Option<StalledMessage>,
    /// Failure to acknowledge delivered ids. They stay pending and will be
    /// redelivered.
    pub acknowledgment_error: Option<StorageError>,
}

impl FlushReport {
    /// True when every fetched message was delivered and acknowledged.
    pub fn is_complete(&self) -> bool {
        self.stalled.is_none()
            && self.acknowledgment_error.is_none()
            && self.delivered.len() == self.fetched
    }
}

enum EngineState {
    NotStarted,
    Running {
        shutdown_tx: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

struct Inner {
    queue: PersistentQueue,
    sink: Arc<dyn Sink>,
    config: ForwarderConfig,
    observer: Arc<dyn ForwardObserver>,
    flush_lock: Mutex<()>,
}

/// Drains the persistent queue into a sink on a fixed interval.
///
/// Cloning is cheap; clones share the scheduler and the flush lock.
#[derive(Clone)]
pub struct ForwardingEngine {
    inner: Arc<Inner>,
    state: Arc<Mutex<EngineState>>,
}

impl ForwardingEngine {
    /// Create an engine with no observer.
    pub fn new(queue: PersistentQueue, sink: Arc<dyn Sink>, config: ForwarderConfig) -> Self {
        Self::with_observer(queue, sink, config, Arc::new(NullForwardObserver))
    }

    /// Create an engine reporting to `observer`.
    pub fn with_observer(
        queue: PersistentQueue,
        sink: Arc<dyn Sink>,
        config: ForwarderConfig,
        observer: Arc<dyn ForwardObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                sink,
                config: config.normalized(),
                observer,
                flush_lock: Mutex::new(()),
            }),
            state: Arc::new(Mutex::new(EngineState::NotStarted)),
        }
    }

    /// Effective configuration after normalization.
    pub fn config(&self) -> &ForwarderConfig {
        &self.inner.config
    }

    /// Run one flush now.
    ///
    /// Serialized with the scheduler and with other callers.
    pub async fn flush_once(&self) -> ForwardResult<FlushReport> {
        self.inner.flush_once().await
    }

    /// Spawn the scheduler task.
    pub async fn start(&self) -> ForwardResult<()> {
        let mut state = self.state.lock().await;
        match *state {
            EngineState::Running { .. } => return Err(ForwardError::AlreadyStarted),
            EngineState::Stopped => return Err(ForwardError::Stopped),
            EngineState::NotStarted => {}
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            inner.run(shutdown_rx).await;
        });

        info!(
            interval_ms = self.inner.config.interval.as_millis() as u64,
            batch_size = self.inner.config.batch_size,
            retries = self.inner.config.retries,
            "Forwarding engine started"
        );

        *state = EngineState::Running {
            shutdown_tx,
            handle,
        };
        Ok(())
    }

    /// Stop the scheduler, letting an in-flight flush finish.
    ///
    /// Idempotent. A stopped engine cannot be restarted.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, EngineState::Stopped) {
            EngineState::Running {
                shutdown_tx,
                handle,
            } => {
                let _ = shutdown_tx.send(());
                if let Err(e) = handle.await {
                    error!(error = %e, "Forwarding scheduler task failed");
                }
                info!("Forwarding engine stopped");
            }
            EngineState::NotStarted => {
                debug!("Forwarding engine stopped before start");
            }
            EngineState::Stopped => {}
        }
    }

    /// Whether the scheduler task is running.
    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, EngineState::Running { .. })
    }
}

impl Inner {
    async fn run(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) {
        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    debug!("Forwarding scheduler received shutdown");
                    break;
                }
                _ = ticker.tick() => {
                    // The flush is not raced against shutdown; stop() waits for it.
                    if let Err(e) = self.flush_once().await {
                        error!(error = %e, "Flush failed");
                    }
                }
            }
        }
    }

    async fn flush_once(&self) -> ForwardResult<FlushReport> {
        let _guard = self.flush_lock.lock().await;

        let batch = self.queue.fetch_pending(self.config.batch_size).await?;
        let mut report = FlushReport {
            fetched: batch.len(),
            ..Default::default()
        };

        if batch.is_empty() {
            return Ok(report);
        }

        debug!(count = batch.len(), "Flushing pending messages");

        for message in &batch {
            match self.deliver(message).await {
                Ok(attempts) => {
                    debug!(id = message.id, attempts, "Message forwarded");
                    self.observer.forwarded(message.id);
                    report.delivered.push(message.id);
                }
                Err(stalled) => {
                    warn!(
                        id = stalled.id,
                        attempts = stalled.attempts,
                        error = %stalled.last_error,
                        "Giving up on message, halting batch"
                    );
                    self.observer.forward_failed(message.id);
                    report.stalled = Some(stalled);
                    break;
                }
            }
        }

        if !report.delivered.is_empty() {
            if let Err(e) = self.queue.mark_sent(&report.delivered).await {
                error!(
                    count = report.delivered.len(),
                    error = %e,
                    "Failed to mark messages as sent; they will be redelivered"
                );
                report.acknowledgment_error = Some(e);
            }
        }

        match self.queue.count_pending().await {
            Ok(count) => self.observer.pending(count),
            Err(e) => warn!(error = %e, "Failed to count pending messages"),
        }

        info!(
            fetched = report.fetched,
            delivered = report.delivered.len(),
            stalled = report.stalled.is_some(),
            "Flush complete"
        );

        Ok(report)
    }

    /// Deliver one message, retrying with backoff. Returns the attempt count.
    async fn deliver(&self, message: &Message) -> Result<u32, StalledMessage> {
        let max_attempts = self.config.max_attempts();
        let timeout = self.config.timeout;
        let mut attempt = 0u32;

        loop {
            if attempt > 0 {
                let delay = compute_backoff(attempt, self.config.backoff_base);
                debug!(
                    id = message.id,
                    retry = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying delivery"
                );
                tokio::time::sleep(delay).await;
            }
            attempt += 1;

            let result = match tokio::time::timeout(timeout, self.sink.send(&message.payload, timeout))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::Timeout(timeout)),
            };

            match result {
                Ok(()) => return Ok(attempt),
                Err(e) if attempt >= max_attempts => {
                    return Err(StalledMessage {
                        id: message.id,
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    warn!(id = message.id, attempt, error = %e, "Delivery attempt failed");
                }
            }
        }
    }
}
