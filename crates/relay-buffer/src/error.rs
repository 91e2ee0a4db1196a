//! Storage error types.

use thiserror::Error;

/// Error raised by the persistent queue.
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The executor thread is gone or the store was never opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or stored data
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using StorageError.
pub type StorageResult<T> = Result<T, StorageError>;

/// Convert a tokio_rusqlite::Error to StorageError.
pub(crate) fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> StorageError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => StorageError::Sqlite(e),
        tokio_rusqlite::Error::ConnectionClosed => {
            StorageError::Connection("Store is closed".to_string())
        }
        tokio_rusqlite::Error::Close((_, e)) => {
            StorageError::Connection(format!("Failed to close store: {}", e))
        }
        other => StorageError::Connection(other.to_string()),
    }
}
