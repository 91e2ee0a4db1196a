//! Configuration management for the relay.

use crate::{CoreError, CoreResult, Paths};
use relay_forwarder::{ForwarderConfig, DEFAULT_BACKOFF_BASE};
use serde::{Deserialize, Deserializer, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable overriding the configured log level.
pub const LOG_LEVEL_ENV: &str = "EDGE_RELAY_LOG_LEVEL";

const DEFAULT_MQTT_TOPIC: &str = "sensors/#";
const DEFAULT_SINK_TOPIC: &str = "iot-sensor-data";
const DEFAULT_METRICS_ADDR: &str = "127.0.0.1:9090";

/// Main relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub buffer: BufferConfig,
    pub mqtt: MqttConfig,
    pub sink: SinkConfig,
    pub server: ServerConfig,
}

/// Where JSON log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutputKind {
    #[default]
    Stdout,
    File,
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    pub output: LogOutputKind,
    /// Log file for `output = "file"`; defaults to `<base>/logs/relay.jsonl`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            output: LogOutputKind::Stdout,
            file: None,
        }
    }
}

/// Buffer and forwarding section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// SQLite buffer file; defaults to `<base>/data/buffer.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(alias = "flush_interval_seconds")]
    pub flush_interval_secs: u64,
    pub batch_size: usize,
    /// Retry attempts after the first; negative selects the default.
    pub retries: i32,
    pub timeout_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        let forwarder = ForwarderConfig::default();
        Self {
            path: None,
            flush_interval_secs: forwarder.interval.as_secs(),
            batch_size: forwarder.batch_size,
            retries: forwarder.retries,
            timeout_ms: forwarder.timeout.as_millis() as u64,
        }
    }
}

impl BufferConfig {
    /// Resolve the buffer path against `paths`.
    pub fn resolve_path(&self, paths: &Paths) -> PathBuf {
        self.path.clone().unwrap_or_else(|| paths.buffer_file())
    }

    /// Forwarding engine settings. Zero or negative values fall back to
    /// the engine defaults.
    pub fn forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            interval: Duration::from_secs(self.flush_interval_secs),
            retries: self.retries,
            timeout: Duration::from_millis(self.timeout_ms),
            batch_size: self.batch_size,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
        .normalized()
    }
}

/// Inbound MQTT section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker URL, e.g. `tcp://localhost:1883`. Ingestion is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<String>,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub qos: u8,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: None,
            topic: DEFAULT_MQTT_TOPIC.to_string(),
            client_id: None,
            qos: 1,
        }
    }
}

impl MqttConfig {
    pub fn is_enabled(&self) -> bool {
        self.broker.as_deref().is_some_and(|b| !b.trim().is_empty())
    }
}

/// Outbound sink transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Http,
    Kafka,
}

/// Outbound sink section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Endpoint for the HTTP sink.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Kafka bootstrap brokers, as a list or a comma-separated string.
    #[serde(deserialize_with = "string_or_list")]
    pub brokers: Vec<String>,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Http,
            url: None,
            brokers: Vec::new(),
            topic: DEFAULT_SINK_TOPIC.to_string(),
            client_id: None,
        }
    }
}

impl SinkConfig {
    /// Whether the selected transport has a destination. Forwarding is
    /// disabled otherwise.
    pub fn is_enabled(&self) -> bool {
        match self.kind {
            SinkKind::Http => self.url.as_deref().is_some_and(|u| !u.trim().is_empty()),
            SinkKind::Kafka => !self.brokers.is_empty(),
        }
    }
}

/// Metrics server section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub metrics_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_addr: DEFAULT_METRICS_ADDR.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn metrics_addr(&self) -> CoreResult<SocketAddr> {
        self.metrics_addr.parse().map_err(|e| {
            CoreError::Config(format!("invalid metrics_addr {:?}: {}", self.metrics_addr, e))
        })
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Brokers {
        One(String),
        Many(Vec<String>),
    }

    let brokers = match Brokers::deserialize(deserializer)? {
        Brokers::One(s) => s.split(',').map(str::to_string).collect(),
        Brokers::Many(list) => list,
    };
    Ok(brokers
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect())
}

impl Config {
    /// Load configuration from `paths`, falling back to defaults when the
    /// file is missing. The log level may be overridden from the environment.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        Self::load_or_default(&paths.config_file())
    }

    /// Load from `path` if it exists, else use defaults.
    pub fn load_or_default(path: &Path) -> CoreResult<Self> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };

        config.apply_log_level_override(std::env::var(LOG_LEVEL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file under `paths`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn apply_log_level_override(&mut self, level: Option<String>) {
        if let Some(level) = level.filter(|l| !l.trim().is_empty()) {
            self.logging.level = level.trim().to_string();
        }
    }

    /// Check values that would otherwise fail later at startup.
    pub fn validate(&self) -> CoreResult<()> {
        if self.mqtt.qos > 2 {
            return Err(CoreError::Config(format!(
                "mqtt.qos must be 0, 1 or 2, got {}",
                self.mqtt.qos
            )));
        }
        if let Some(broker) = self.mqtt.broker.as_deref().filter(|b| !b.trim().is_empty()) {
            Url::parse(broker)?;
        }
        if self.sink.kind == SinkKind::Http {
            if let Some(url) = self.sink.url.as_deref().filter(|u| !u.trim().is_empty()) {
                Url::parse(url)?;
            }
        }
        self.server.metrics_addr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.logging.output, LogOutputKind::Stdout);
        assert_eq!(config.buffer.flush_interval_secs, 30);
        assert_eq!(config.buffer.batch_size, 100);
        assert_eq!(config.buffer.retries, 3);
        assert_eq!(config.buffer.timeout_ms, 5000);
        assert_eq!(config.mqtt.topic, "sensors/#");
        assert_eq!(config.mqtt.qos, 1);
        assert!(!config.mqtt.is_enabled());
        assert_eq!(config.sink.kind, SinkKind::Http);
        assert_eq!(config.sink.topic, "iot-sensor-data");
        assert!(!config.sink.is_enabled());
        assert_eq!(config.server.metrics_addr, "127.0.0.1:9090");
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "logging": { "level": "debug", "output": "file", "file": "/var/log/relay.jsonl" },
            "buffer": { "path": "/data/buffer.db", "flush_interval_seconds": 10, "retries": 5 },
            "mqtt": { "broker": "tcp://localhost:1883", "client_id": "edge-1" },
            "sink": { "kind": "kafka", "brokers": "k1:9092, k2:9092", "topic": "telemetry" }
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.output, LogOutputKind::File);
        assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/relay.jsonl")));
        assert_eq!(config.buffer.path, Some(PathBuf::from("/data/buffer.db")));
        assert_eq!(config.buffer.flush_interval_secs, 10);
        assert_eq!(config.buffer.retries, 5);
        assert_eq!(config.buffer.batch_size, 100);
        assert!(config.mqtt.is_enabled());
        assert_eq!(config.mqtt.topic, "sensors/#");
        assert_eq!(config.sink.kind, SinkKind::Kafka);
        assert_eq!(config.sink.brokers, vec!["k1:9092", "k2:9092"]);
        assert!(config.sink.is_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_brokers_as_list() {
        let config: Config =
            serde_json::from_str(r#"{ "sink": { "kind": "kafka", "brokers": ["a:9092", ""] } }"#)
                .unwrap();
        assert_eq!(config.sink.brokers, vec!["a:9092"]);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.buffer.batch_size = 25;
        config.sink.url = Some("http://collector.local/ingest".to_string());
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.buffer, BufferConfig::default());
        assert_eq!(config.buffer.resolve_path(&paths), paths.buffer_file());
    }

    #[test]
    fn test_log_level_override() {
        let mut config = Config::default();
        config.apply_log_level_override(Some(" trace ".to_string()));
        assert_eq!(config.logging.level, "trace");

        config.apply_log_level_override(Some(String::new()));
        assert_eq!(config.logging.level, "trace");

        config.apply_log_level_override(None);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_forwarder_config_normalizes() {
        let buffer = BufferConfig {
            flush_interval_secs: 0,
            batch_size: 0,
            retries: -1,
            timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(buffer.forwarder_config(), ForwarderConfig::default());

        let buffer = BufferConfig {
            flush_interval_secs: 5,
            retries: 0,
            timeout_ms: 250,
            ..Default::default()
        };
        let forwarder = buffer.forwarder_config();
        assert_eq!(forwarder.interval, Duration::from_secs(5));
        assert_eq!(forwarder.retries, 0);
        assert_eq!(forwarder.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.mqtt.qos = 3;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let mut config = Config::default();
        config.sink.url = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(CoreError::InvalidUrl(_))));

        let mut config = Config::default();
        config.server.metrics_addr = "nowhere".to_string();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load_or_default(&path), Err(CoreError::Json(_))));
    }
}
