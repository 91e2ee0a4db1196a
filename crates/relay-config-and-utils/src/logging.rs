//! Logging initialization for the relay.

use crate::{LogOutputKind, LoggingConfig, Paths};
use observability::{LogConfig, LogOutput};

const SERVICE_NAME: &str = "edge-relay";

/// Initialize the global subscriber from the `logging` section.
///
/// JSON lines go to stdout or to the configured file (default
/// `<base>/logs/relay.jsonl`). Writing to a file also enables compact
/// stderr output for foreground runs. `RUST_LOG` overrides the level.
pub fn init_logging(config: &LoggingConfig, paths: &Paths) -> std::io::Result<()> {
    observability::init_with_config(log_config(config, paths))
}

fn log_config(config: &LoggingConfig, paths: &Paths) -> LogConfig {
    let output = match config.output {
        LogOutputKind::Stdout => LogOutput::Stdout,
        LogOutputKind::File => {
            LogOutput::File(config.file.clone().unwrap_or_else(|| paths.log_file()))
        }
    };

    LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: config.level.clone(),
        also_stderr: matches!(output, LogOutput::File(_)),
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn stdout_output_skips_stderr() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/relay"));
        let log = log_config(&LoggingConfig::default(), &paths);
        assert_eq!(log.service_name, "edge-relay");
        assert_eq!(log.default_level, "info");
        assert_eq!(log.output, LogOutput::Stdout);
        assert!(!log.also_stderr);
    }

    #[test]
    fn file_output_defaults_under_logs_dir() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/relay"));
        let config = LoggingConfig {
            level: "debug".into(),
            output: LogOutputKind::File,
            file: None,
        };
        let log = log_config(&config, &paths);
        assert_eq!(log.output, LogOutput::File(paths.log_file()));
        assert!(log.also_stderr);
    }
}
