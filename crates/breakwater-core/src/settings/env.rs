//! Environment variable overlay for breaker settings

use std::env;
use std::str::FromStr;

use humantime_serde::re::humantime;

use crate::error::{BreakwaterError, BreakwaterResult};

use super::types::{BreakerSettings, ClassifierKind, ManagerSettings};

/// Prefix used when none is given
pub const DEFAULT_ENV_PREFIX: &str = "BREAKWATER";

impl BreakerSettings {
    /// Overlay `{prefix}_THRESHOLD`, `{prefix}_TIMEOUT`,
    /// `{prefix}_HALF_OPEN_MAX_REQUESTS`, `{prefix}_SUCCESS_THRESHOLD` and
    /// `{prefix}_CLASSIFIER` from the process environment
    pub fn apply_env(&mut self, prefix: &str) -> BreakwaterResult<()> {
        self.apply_env_with(prefix, |name| env::var(name).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with a custom variable lookup
    pub fn apply_env_with<F>(&mut self, prefix: &str, lookup: F) -> BreakwaterResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| format!("{}_{}", prefix, suffix);

        if let Some(threshold) = parse_var::<u32, _>(&lookup, &var("THRESHOLD"))? {
            self.threshold = threshold;
        }

        let name = var("TIMEOUT");
        if let Some(raw) = lookup(&name) {
            self.timeout = humantime::parse_duration(raw.trim()).map_err(|e| {
                BreakwaterError::parse_with_context(
                    "env",
                    format!("Invalid {} value: {}", name, e),
                    format!("Parsing duration '{}'", raw),
                )
            })?;
        }

        if let Some(max) = parse_var::<u32, _>(&lookup, &var("HALF_OPEN_MAX_REQUESTS"))? {
            self.half_open_max_requests = max;
        }

        if let Some(threshold) = parse_var::<u32, _>(&lookup, &var("SUCCESS_THRESHOLD"))? {
            self.success_threshold = threshold;
        }

        let name = var("CLASSIFIER");
        if let Some(raw) = lookup(&name) {
            self.classifier = ClassifierKind::from_str(&raw).map_err(|e| {
                BreakwaterError::parse_with_context("env", e.message(), format!("Reading {}", name))
            })?;
        }

        self.validate()
    }
}

impl ManagerSettings {
    /// Overlay the environment onto the defaults shared by every key
    pub fn apply_env(&mut self, prefix: &str) -> BreakwaterResult<()> {
        self.defaults.apply_env(prefix)?;
        self.validate()
    }

    pub fn apply_env_with<F>(&mut self, prefix: &str, lookup: F) -> BreakwaterResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.defaults.apply_env_with(prefix, lookup)?;
        self.validate()
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> BreakwaterResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };

    raw.trim().parse().map(Some).map_err(|_| {
        BreakwaterError::parse_with_context(
            "env",
            format!("Invalid {} value", name),
            format!("Parsing '{}' as a number", raw),
        )
    })
}
