//! Serializable breaker settings

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::breaker::{
    BreakerConfig, DEFAULT_HALF_OPEN_MAX_REQUESTS, DEFAULT_SUCCESS_THRESHOLD, DEFAULT_THRESHOLD,
    DEFAULT_TIMEOUT, FailureClassifier,
};
use crate::error::{BreakwaterError, BreakwaterResult};

/// Named failure classifier, for configs that can't carry a closure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Every error counts
    #[default]
    AnyError,
    /// HTTP 429 and 5xx count
    HttpServerOrThrottle,
    /// Only HTTP 5xx counts
    HttpServerErrors,
}

impl ClassifierKind {
    pub fn classifier(self) -> FailureClassifier {
        match self {
            Self::AnyError => FailureClassifier::any_error(),
            Self::HttpServerOrThrottle => FailureClassifier::http_server_or_throttle(),
            Self::HttpServerErrors => FailureClassifier::http_server_errors(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnyError => "any_error",
            Self::HttpServerOrThrottle => "http_server_or_throttle",
            Self::HttpServerErrors => "http_server_errors",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierKind {
    type Err = BreakwaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "any_error" => Ok(Self::AnyError),
            "http_server_or_throttle" => Ok(Self::HttpServerOrThrottle),
            "http_server_errors" => Ok(Self::HttpServerErrors),
            other => Err(BreakwaterError::config_field(
                format!(
                    "Unknown classifier '{}', expected any_error, http_server_or_throttle or http_server_errors",
                    other
                ),
                "classifier",
            )),
        }
    }
}

/// Tunables for one breaker
///
/// Missing fields take the breaker defaults, so an empty table is valid.
///
/// ```toml
/// threshold = 5
/// timeout = "30s"
/// half_open_max_requests = 3
/// success_threshold = 2
/// classifier = "http_server_or_throttle"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerSettings {
    pub threshold: u32,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub half_open_max_requests: u32,
    pub success_threshold: u32,
    pub classifier: ClassifierKind,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            timeout: DEFAULT_TIMEOUT,
            half_open_max_requests: DEFAULT_HALF_OPEN_MAX_REQUESTS,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            classifier: ClassifierKind::default(),
        }
    }
}

impl BreakerSettings {
    /// Reject values a breaker would have to silently correct
    pub fn validate(&self) -> BreakwaterResult<()> {
        for (field, value) in [
            ("threshold", self.threshold),
            ("half_open_max_requests", self.half_open_max_requests),
            ("success_threshold", self.success_threshold),
        ] {
            if value == 0 {
                return Err(BreakwaterError::config_field(
                    format!("{} must be at least 1", field),
                    field,
                ));
            }
        }

        if self.timeout.is_zero() {
            return Err(BreakwaterError::config_field(
                "timeout must be greater than zero",
                "timeout",
            ));
        }

        Ok(())
    }

    /// Build a breaker config named `name`
    pub fn into_config(self, name: impl Into<String>) -> BreakerConfig {
        BreakerConfig::default()
            .with_name(name)
            .with_threshold(self.threshold)
            .with_timeout(self.timeout)
            .with_half_open_max_requests(self.half_open_max_requests)
            .with_success_threshold(self.success_threshold)
            .with_classifier(self.classifier.classifier())
    }

    /// These settings with any fields set in `overrides` replaced
    pub fn merged(&self, overrides: &BreakerOverrides) -> Self {
        Self {
            threshold: overrides.threshold.unwrap_or(self.threshold),
            timeout: overrides.timeout.unwrap_or(self.timeout),
            half_open_max_requests: overrides
                .half_open_max_requests
                .unwrap_or(self.half_open_max_requests),
            success_threshold: overrides
                .success_threshold
                .unwrap_or(self.success_threshold),
            classifier: overrides.classifier.unwrap_or(self.classifier),
        }
    }
}

/// Per-key settings layered over [`ManagerSettings::defaults`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub half_open_max_requests: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<ClassifierKind>,
}

/// Settings for a [`BreakerManager`](crate::breaker::BreakerManager)
///
/// ```toml
/// [defaults]
/// threshold = 5
/// timeout = "30s"
///
/// [breakers.ollama]
/// threshold = 3
/// timeout = "10s"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerSettings {
    pub defaults: BreakerSettings,
    pub breakers: HashMap<String, BreakerOverrides>,
}

impl ManagerSettings {
    /// Effective settings for `key`
    pub fn for_key(&self, key: &str) -> BreakerSettings {
        match self.breakers.get(key) {
            Some(overrides) => self.defaults.merged(overrides),
            None => self.defaults.clone(),
        }
    }

    /// Validate the defaults and every keyed entry after merging
    pub fn validate(&self) -> BreakwaterResult<()> {
        self.defaults.validate().map_err(|e| in_section(e, "defaults"))?;

        let mut keys: Vec<&String> = self.breakers.keys().collect();
        keys.sort();
        for key in keys {
            self.for_key(key)
                .validate()
                .map_err(|e| in_section(e, &format!("breakers.{}", key)))?;
        }
        Ok(())
    }
}

fn in_section(err: BreakwaterError, section: &str) -> BreakwaterError {
    match err {
        BreakwaterError::Config {
            message,
            field: Some(field),
            ..
        } => BreakwaterError::Config {
            message,
            context: Some(format!("field '{}.{}'", section, field)),
            field: Some(field),
        },
        other => other,
    }
}
