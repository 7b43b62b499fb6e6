//! Logging setup on top of `tracing-subscriber`

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Default filter directive when `RUST_LOG` is unset
pub const DEFAULT_LOG_DIRECTIVE: &str = "info";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub format: LogFormat,
    pub directive: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Pretty,
            directive: DEFAULT_LOG_DIRECTIVE.to_string(),
        }
    }
}

fn filter_for(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Install the global subscriber. `RUST_LOG` overrides the configured
/// directive. Returns false if a subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_for(&config.directive))
        .with_target(false);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed.is_ok()
}

/// Subscriber for unit tests; output is captured per test
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for("warn"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.directive, DEFAULT_LOG_DIRECTIVE);
    }

    #[test]
    fn test_log_config_from_json() {
        let config: LogConfig =
            serde_json::from_str(r#"{"format": "json", "directive": "reest_runtime=debug"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.directive, "reest_runtime=debug");
    }

    #[test]
    fn test_second_init_is_not_an_error() {
        init_test_logging();
        assert!(!init_logging(&LogConfig::default()));
    }
}
