//! Core error type for the configuration layer

use thiserror::Error;

/// Result type alias for breakwater operations
pub type BreakwaterResult<T> = Result<T, BreakwaterError>;

/// Main error type for breakwater settings and setup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BreakwaterError {
    /// Invalid or inconsistent configuration values
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        field: Option<String>,
        context: Option<String>,
    },

    /// Reading a settings file failed
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// A settings document or value could not be parsed
    #[error("Parse error ({format}): {message}")]
    Parse {
        message: String,
        format: String,
        context: Option<String>,
    },
}

impl BreakwaterError {
    /// Get the error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "BREAKWATER_CONFIG",
            Self::Io { .. } => "BREAKWATER_IO",
            Self::Parse { .. } => "BREAKWATER_PARSE",
        }
    }

    /// Get the human-readable error message
    pub fn message(&self) -> &str {
        match self {
            Self::Config { message, .. } => message,
            Self::Io { message, .. } => message,
            Self::Parse { message, .. } => message,
        }
    }

    /// Get optional context about the error
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::Config { context, .. } => context.as_deref(),
            Self::Io { path, .. } => path.as_deref(),
            Self::Parse { context, .. } => context.as_deref(),
        }
    }
}
