//! Logging setup for processes embedding breakwater
//!
//! Breakers emit `tracing` events with a `circuit` field. This installs a
//! global subscriber to print them; applications that already have one
//! don't need it.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use breakwater_core::error::{BreakwaterError, BreakwaterResult};

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`,
    /// `breakwater_core=debug`)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Filter from `RUST_LOG`, falling back to the configured level
    pub fn env_filter(&self) -> BreakwaterResult<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| {
                BreakwaterError::config_field(
                    format!("Invalid log level '{}': {}", self.level, e),
                    "level",
                )
            }),
        }
    }
}

/// Install the global subscriber.
///
/// Fails if the level is not a valid filter or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> BreakwaterResult<()> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| {
        BreakwaterError::config_with_context(
            format!("Failed to install log subscriber: {}", e),
            "init_logging",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_logging_config_from_json() {
        let config: LoggingConfig = serde_json::from_str(r#"{"format": "json"}"#).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_init_twice_fails() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        };
        // Another test in this binary may have installed one already
        let _ = init_logging(&config);
        let err = init_logging(&config).unwrap_err();
        assert_eq!(err.error_code(), "BREAKWATER_CONFIG");
    }
}
