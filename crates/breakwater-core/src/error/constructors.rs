//! Constructor methods for BreakwaterError

use super::types::BreakwaterError;

impl BreakwaterError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
            context: None,
        }
    }

    /// Create a configuration error naming the offending field
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        Self::Config {
            message: message.into(),
            context: Some(format!("field '{}'", field)),
            field: Some(field),
        }
    }

    /// Create a configuration error with context
    pub fn config_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
            context: Some(context.into()),
        }
    }

    /// Create an IO error for a path
    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a parse error for the given format (toml, env, ...)
    pub fn parse(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            format: format.into(),
            context: None,
        }
    }

    /// Create a parse error with context
    pub fn parse_with_context(
        format: impl Into<String>,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::Parse {
            message: message.into(),
            format: format.into(),
            context: Some(context.into()),
        }
    }
}

impl From<toml::de::Error> for BreakwaterError {
    fn from(err: toml::de::Error) -> Self {
        Self::parse("toml", err.message().to_string())
    }
}
