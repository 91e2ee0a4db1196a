//! File system paths for the relay.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the relay.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for relay files (~/.edge-relay)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a Paths instance rooted at `~/.edge-relay`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".edge-relay"),
        })
    }

    /// Create a Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.edge-relay).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.edge-relay/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the data directory (~/.edge-relay/data).
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the default buffer database path (~/.edge-relay/data/buffer.db).
    pub fn buffer_file(&self) -> PathBuf {
        self.data_dir().join("buffer.db")
    }

    /// Get the logs directory (~/.edge-relay/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the default log file path (~/.edge-relay/logs/relay.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("relay.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
