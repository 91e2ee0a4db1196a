//! Observer hooks for queue writes.
//!
//! The queue reports committed writes to an observer supplied at
//! construction time. Hooks run after the commit and never affect it.

use crate::MessageId;

/// Receives notifications about committed queue writes.
pub trait QueueObserver: Send + Sync {
    /// A message was durably appended.
    fn enqueued(&self, _id: MessageId) {}

    /// A batch of messages was atomically marked as sent; `count` is the
    /// number of rows that moved from pending to sent.
    fn marked_sent(&self, _count: usize) {}
}

/// Observer that discards all notifications.
#[derive(Debug, Default)]
pub struct NullQueueObserver;

impl QueueObserver for NullQueueObserver {}
