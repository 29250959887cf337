//! Breakwater core library
//!
//! Circuit breakers that stop calling a failing dependency, probe it after a
//! recovery timeout, and close again once it answers. Includes failure
//! classification, a keyed breaker registry and TOML/env settings.

pub mod breaker;
pub mod clock;
pub mod error;
pub mod settings;

// Re-export commonly used types
pub use breaker::{
    Breaker, BreakerConfig, BreakerError, BreakerManager, BreakerStats, CircuitState,
    FailureClassifier, ListenerId, Permit, Rejection, StateChange, StatusError,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BreakwaterError, BreakwaterResult};
pub use settings::{BreakerOverrides, BreakerSettings, ClassifierKind, ManagerSettings};
