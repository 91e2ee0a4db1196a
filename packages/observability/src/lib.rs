//! # Observability
//!
//! Logging setup for the edge relay.
//!
//! Services call [`init_with_config`] once at startup and use the standard
//! `tracing` macros everywhere else. Every event becomes one JSON line with
//! timestamp, level, service, pid, target, message and fields, written to
//! stdout or appended to a file.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "edge-relay".into(),
//!     default_level: "debug".into(),
//!     output: observability::LogOutput::File("/var/log/edge-relay.jsonl".into()),
//!     also_stderr: true,
//! })?;
//! tracing::info!("relay started");
//! ```

mod json_layer;
mod writer;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{AppendFileWriter, AppendFileWriterFactory};

/// Destination for JSON log lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogOutput {
    /// One JSON object per line on stdout.
    #[default]
    Stdout,
    /// JSON lines appended to a file; parent directories are created.
    File(PathBuf),
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every log line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info"). `RUST_LOG` takes precedence.
    pub default_level: String,

    /// Where JSON lines go.
    pub output: LogOutput,

    /// Also emit compact human-readable lines on stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            output: LogOutput::default(),
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) -> io::Result<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Install the global subscriber described by `config`.
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    let make_writer = match &config.output {
        LogOutput::Stdout => BoxMakeWriter::new(io::stdout),
        LogOutput::File(path) => BoxMakeWriter::new(AppendFileWriterFactory::open(path)?),
    };

    let json_layer = JsonLayer::new(config.service_name.clone(), make_writer);

    let stderr_layer = if config.also_stderr {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_writer(io::stderr)
                .with_ansi(true)
                .with_filter(env_filter(&config.default_level)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(json_layer.with_filter(env_filter(&config.default_level)))
        .with(stderr_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    tracing::info!(
        service = %config.service_name,
        output = ?config.output,
        "observability initialized"
    );
    Ok(())
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Parse a log level string into a tracing Level; unknown values map to INFO.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

pub use tracing::Level;
