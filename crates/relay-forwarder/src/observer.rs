//! Observer hooks for forwarding outcomes.

use relay_buffer::MessageId;

/// Receives forwarding outcomes from the engine.
pub trait ForwardObserver: Send + Sync {
    /// A message was delivered to the sink.
    fn forwarded(&self, _id: MessageId) {}

    /// A message exhausted its delivery attempts and halted the flush.
    fn forward_failed(&self, _id: MessageId) {}

    /// Pending count read at the end of a flush.
    fn pending(&self, _count: u64) {}
}

/// Observer that discards all notifications.
#[derive(Debug, Default)]
pub struct NullForwardObserver;

impl ForwardObserver for NullForwardObserver {}
