//! Configuration, paths and utilities for the edge relay.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    BufferConfig, Config, LoggingConfig, LogOutputKind, MqttConfig, ServerConfig, SinkConfig,
    SinkKind, DEFAULT_LOG_LEVEL, LOG_LEVEL_ENV,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
