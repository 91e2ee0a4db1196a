//! Persistent FIFO queue over the `messages` table.

use crate::error::from_tokio_rusqlite;
use crate::models::from_unix_seconds;
use crate::{
    migrations, Message, MessageId, MessageStatus, NullQueueObserver, QueueObserver, StorageError,
    StorageResult,
};
use chrono::Utc;
use rusqlite::{params, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// Batch size used when `fetch_pending` is called with a zero limit.
pub const DEFAULT_FETCH_LIMIT: usize = 50;

/// Durable, ordered message queue backed by SQLite.
///
/// Cloning the queue shares the same executor thread, so every clone sees
/// the same committed state.
#[derive(Clone)]
pub struct PersistentQueue {
    conn: Connection,
    path: String,
    observer: Arc<dyn QueueObserver>,
}

impl PersistentQueue {
    /// Open the queue at the given path with a no-op observer.
    pub async fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_observer(path, Arc::new(NullQueueObserver)).await
    }

    /// Open the queue at the given path.
    ///
    /// This will:
    /// - Create the database file and its parent directory if missing
    /// - Enable WAL mode with full synchronous commits
    /// - Run any pending migrations
    pub async fn open_with_observer(
        path: &Path,
        observer: Arc<dyn QueueObserver>,
    ) -> StorageResult<Self> {
        if path.as_os_str().is_empty() {
            return Err(StorageError::InvalidData("buffer path is empty".to_string()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let path_str = path.to_string_lossy().to_string();
        info!(path = %path_str, "Opening message buffer");

        let conn = Connection::open(path)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let queue = Self {
            conn,
            path: path_str,
            observer,
        };
        queue
            .call(|conn| {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode = WAL;
                    PRAGMA synchronous = FULL;
                    PRAGMA busy_timeout = 5000;
                    ",
                )?;
                migrations::run_migrations(conn)
            })
            .await?;

        info!(path = %queue.path, "Message buffer ready");
        Ok(queue)
    }

    /// Open an in-memory queue for testing.
    pub async fn open_in_memory() -> StorageResult<Self> {
        Self::open_in_memory_with_observer(Arc::new(NullQueueObserver)).await
    }

    /// Open an in-memory queue reporting to `observer`.
    pub async fn open_in_memory_with_observer(
        observer: Arc<dyn QueueObserver>,
    ) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let queue = Self {
            conn,
            path: ":memory:".to_string(),
            observer,
        };
        queue.call(|conn| migrations::run_migrations(conn)).await?;
        Ok(queue)
    }

    /// Run a closure on the executor thread.
    ///
    /// Only SQL and row mapping belong inside the closure.
    async fn call<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        match self.conn.call(move |conn| Ok(f(conn))).await {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Append a payload as a new pending message and return its id.
    ///
    /// The row is committed before this returns.
    pub async fn enqueue(&self, payload: impl Into<Vec<u8>>) -> StorageResult<MessageId> {
        let payload = payload.into();
        let len = payload.len();
        let created_at = Utc::now().timestamp();

        let id = self
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    "INSERT INTO messages (payload, created_at, sent) VALUES (?1, ?2, 0)",
                )?;
                stmt.execute(params![payload, created_at])?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        self.observer.enqueued(id);
        debug!(id, len, "Enqueued message");
        Ok(id)
    }

    /// Get up to `limit` pending messages in ascending id order.
    ///
    /// A zero limit falls back to [`DEFAULT_FETCH_LIMIT`].
    pub async fn fetch_pending(&self, limit: usize) -> StorageResult<Vec<Message>> {
        let limit = if limit == 0 { DEFAULT_FETCH_LIMIT } else { limit };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.call(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, payload, created_at, sent
                 FROM messages
                 WHERE sent = 0
                 ORDER BY id ASC
                 LIMIT ?1",
            )?;

            let messages = stmt
                .query_map(params![limit], |row| {
                    Ok(Message {
                        id: row.get(0)?,
                        payload: row.get(1)?,
                        enqueued_at: from_unix_seconds(row.get(2)?),
                        status: MessageStatus::from_db(row.get(3)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(messages)
        })
        .await
    }

    /// Mark the given ids as sent in one transaction.
    ///
    /// Either every id transitions or none does. An empty slice is a no-op.
    pub async fn mark_sent(&self, ids: &[MessageId]) -> StorageResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids = ids.to_vec();
        let requested = ids.len();

        let transitioned = self
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let mut changed = 0usize;
                {
                    let mut stmt = tx.prepare_cached(
                        "UPDATE messages SET sent = 1 WHERE id = ?1 AND sent = 0",
                    )?;
                    for id in &ids {
                        changed += stmt.execute(params![id])?;
                    }
                }
                tx.commit()?;
                Ok(changed)
            })
            .await?;

        // Ids that were already sent (or never existed) do not count.
        if transitioned > 0 {
            self.observer.marked_sent(transitioned);
        }
        debug!(requested, transitioned, "Marked messages as sent");
        Ok(())
    }

    /// Count messages still waiting for delivery.
    pub async fn count_pending(&self) -> StorageResult<u64> {
        self.call(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(1) FROM messages WHERE sent = 0",
                [],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
        .await
    }

    /// Get the database file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check that the executor thread answers a trivial query.
    pub async fn health_check(&self) -> StorageResult<()> {
        self.call(|conn| {
            conn.execute_batch("SELECT 1")?;
            Ok(())
        })
        .await?;
        debug!("Message buffer health check passed");
        Ok(())
    }

    /// Close the queue.
    ///
    /// Waits for queued operations to finish, then stops the executor
    /// thread. Other clones fail with [`StorageError::Connection`] afterwards.
    pub async fn close(self) -> StorageResult<()> {
        self.conn.close().await.map_err(from_tokio_rusqlite)?;
        info!(path = %self.path, "Message buffer closed");
        Ok(())
    }
}

impl std::fmt::Debug for PersistentQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentQueue")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
