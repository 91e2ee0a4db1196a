//! Integration tests for the forwarding engine.
//!
//! - `ordering.rs`    - stop rule and delivery order
//! - `retry.rs`       - retry boundary, backoff and timeouts
//! - `concurrency.rs` - enqueue racing flushes, serialized flushes
//! - `lifecycle.rs`   - start/stop state machine and acknowledgment failure


use crate::{DeliveryError, ForwarderConfig, Sink};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Config with tiny delays so retries finish quickly.
pub(super) fn fast_config(retries: i32) -> ForwarderConfig {
    ForwarderConfig {
        interval: Duration::from_millis(20),
        retries,
        timeout: Duration::from_millis(200),
        batch_size: 100,
        backoff_base: Duration::from_millis(1),
    }
}

/// Sink whose failures are scripted per payload.
#[derive(Default)]
pub(super) struct ScriptedSink {
    /// Remaining failures per payload; `u32::MAX` fails forever.
    failures: Mutex<HashMap<Vec<u8>, u32>>,
    attempts: Mutex<Vec<Vec<u8>>>,
    timeouts: Mutex<Vec<Duration>>,
    delivered: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedSink {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn fail_times(self, payload: &[u8], times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(payload.to_vec(), times);
        self
    }

    pub(super) fn fail_always(self, payload: &[u8]) -> Self {
        self.fail_times(payload, u32::MAX)
    }

    pub(super) fn attempts(&self) -> Vec<Vec<u8>> {
        self.attempts.lock().unwrap().clone()
    }

    pub(super) fn attempts_for(&self, payload: &[u8]) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_slice() == payload)
            .count()
    }

    /// Timeout passed to each `send`, in attempt order.
    pub(super) fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }

    pub(super) fn delivered(&self) -> Vec<Vec<u8>> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for ScriptedSink {
    async fn send(&self, payload: &[u8], timeout: Duration) -> Result<(), DeliveryError> {
        self.attempts.lock().unwrap().push(payload.to_vec());
        self.timeouts.lock().unwrap().push(timeout);

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(payload) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                return Err(DeliveryError::Transport("scripted failure".to_string()));
            }
        }
        drop(failures);

        self.delivered.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}

/// Sink that blocks inside `send` until released.
#[derive(Default)]
pub(super) struct GatedSink {
    pub(super) entered: Notify,
    pub(super) release: Notify,
    pub(super) sent: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl Sink for GatedSink {
    async fn send(&self, payload: &[u8], _timeout: Duration) -> Result<(), DeliveryError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.sent.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}
