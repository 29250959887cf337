//! Loading settings from TOML text and files

use std::fs;
use std::path::Path;

use crate::breaker::{Breaker, BreakerManager};
use crate::error::{BreakwaterError, BreakwaterResult};

use super::types::{BreakerSettings, ManagerSettings};

impl BreakerSettings {
    /// Parse and validate settings for a single breaker
    pub fn from_toml_str(content: &str) -> BreakwaterResult<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }
}

impl ManagerSettings {
    /// Parse and validate manager settings
    pub fn from_toml_str(content: &str) -> BreakwaterResult<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load manager settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> BreakwaterResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            BreakwaterError::io_with_path(
                format!("Failed to read settings file: {}", e),
                path.display().to_string(),
            )
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| {
            BreakwaterError::parse_with_context(
                "toml",
                e.message().to_string(),
                format!("Deserializing breaker settings from '{}'", path.display()),
            )
        })?;
        settings.validate()?;

        tracing::debug!(
            path = %path.display(),
            breakers = settings.breakers.len(),
            "Loaded circuit breaker settings"
        );
        Ok(settings)
    }
}

impl BreakerManager {
    /// Build a manager whose breakers take their settings from `settings`,
    /// each named after its key
    pub fn from_settings(settings: ManagerSettings) -> BreakwaterResult<Self> {
        settings.validate()?;
        Ok(Self::with_keyed_factory(move |key| {
            Breaker::new(settings.for_key(key).into_config(key))
        }))
    }
}
