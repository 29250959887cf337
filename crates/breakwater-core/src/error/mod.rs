//! Error types for breakwater
//!
//! Breaker rejections live next to the breaker (`crate::breaker::Rejection`).
//! This module covers the configuration layer: settings files, environment
//! overlays and validation. Every variant carries:
//! - error_code: A unique identifier for programmatic error handling
//! - message: Human-readable error message
//! - context: Optional additional context about where/why the error occurred

mod constructors;
mod types;

pub use types::{BreakwaterError, BreakwaterResult};
