//! Forwarding engine for the edge relay.
//!
//! This crate provides:
//! - ForwardingEngine: drains the persistent queue on a fixed interval
//! - Sink: the narrow delivery capability the engine forwards into
//! - ForwardObserver: hooks for forwarding metrics
//!
//! Delivery inside one flush is strictly sequential. A message that
//! exhausts its retries halts the flush, so a later message is never
//! marked sent while an earlier one is still pending.

mod backoff;
mod config;
mod engine;
mod error;
mod observer;
mod sink;

#[cfg(test)]
mod tests;

pub use backoff::compute_backoff;
pub use config::{
    ForwarderConfig, DEFAULT_BACKOFF_BASE, DEFAULT_BATCH_SIZE, DEFAULT_INTERVAL, DEFAULT_RETRIES,
    DEFAULT_TIMEOUT,
};
pub use engine::{FlushReport, ForwardingEngine, StalledMessage};
pub use error::{DeliveryError, ForwardError, ForwardResult};
pub use observer::{ForwardObserver, NullForwardObserver};
pub use sink::Sink;
