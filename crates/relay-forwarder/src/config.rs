//! Forwarding engine configuration.

use std::time::Duration;

/// Default time between flushes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
/// Default retry attempts per message after the first.
pub const DEFAULT_RETRIES: i32 = 3;
/// Default wait per delivery attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default messages fetched per flush.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default base delay before the first retry.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Configuration for the forwarding engine.
///
/// Out-of-range values are replaced with defaults by [`normalized`](Self::normalized):
/// - `interval`: zero → 30s
/// - `retries`: negative → 3
/// - `timeout`: zero → 5s
/// - `batch_size`: zero → 100
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderConfig {
    /// Time between flush attempts.
    pub interval: Duration,
    /// Max retry attempts per message after the first attempt.
    pub retries: i32,
    /// Max wait per delivery attempt.
    pub timeout: Duration,
    /// Max messages fetched per flush.
    pub batch_size: usize,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff_base: Duration,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl ForwarderConfig {
    /// Replace out-of-range values with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.interval.is_zero() {
            self.interval = DEFAULT_INTERVAL;
        }
        if self.retries < 0 {
            self.retries = DEFAULT_RETRIES;
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        self
    }

    /// Total attempts allowed per message.
    pub fn max_attempts(&self) -> u32 {
        u32::try_from(self.retries.max(0)).unwrap_or(0).saturating_add(1)
    }
}
