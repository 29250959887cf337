//! Declarative breaker settings
//!
//! Settings are plain serde data loaded from TOML and overlaid with
//! environment variables, then turned into a [`BreakerConfig`] or a
//! [`BreakerManager`]. Callbacks and clocks can't be expressed here; add them
//! to the config afterwards.
//!
//! [`BreakerConfig`]: crate::breaker::BreakerConfig
//! [`BreakerManager`]: crate::breaker::BreakerManager

mod env;
mod loader;
mod types;


pub use env::DEFAULT_ENV_PREFIX;
pub use types::{BreakerOverrides, BreakerSettings, ClassifierKind, ManagerSettings};
