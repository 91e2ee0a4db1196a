//! Durable message buffer for the edge relay.
//!
//! This crate provides:
//! - PersistentQueue: SQLite-backed FIFO of pending and sent messages
//! - Schema migrations for the `messages` table
//! - Model types for stored messages
//! - QueueObserver hooks for metrics collaborators
//!
//! # Architecture
//!
//! All SQL runs on a single dedicated executor thread (`tokio-rusqlite`).
//! Writers are serialized by that thread, and every read observes only
//! committed rows. The database runs in WAL mode with `synchronous = FULL`,
//! so an `enqueue` that returned `Ok` survives an unclean termination.
//!
//! ```ignore
//! let queue = PersistentQueue::open(Path::new("./data/buffer.db")).await?;
//! let id = queue.enqueue(b"temp=21.5".to_vec()).await?;
//! let batch = queue.fetch_pending(10).await?;
//! queue.mark_sent(&[id]).await?;
//! ```

mod error;
mod migrations;
mod models;
mod observer;
mod queue;

#[cfg(test)]
mod tests;

pub use error::{StorageError, StorageResult};
pub use migrations::{run_migrations, CURRENT_VERSION};
pub use models::{Message, MessageId, MessageStatus};
pub use observer::{NullQueueObserver, QueueObserver};
pub use queue::{PersistentQueue, DEFAULT_FETCH_LIMIT};
