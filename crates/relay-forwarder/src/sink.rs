//! Delivery capability consumed by the forwarding engine.

use crate::DeliveryError;
use async_trait::async_trait;
use std::time::Duration;

/// Downstream destination for buffered payloads.
///
/// The engine may hand the same payload to `send` more than once; delivery
/// is at-least-once. Connection management belongs to the implementation.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver one payload, waiting at most `timeout` for confirmation.
    async fn send(&self, payload: &[u8], timeout: Duration) -> Result<(), DeliveryError>;

    /// Flush and release transport resources.
    async fn close(&self) {}
}
