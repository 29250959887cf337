//! Circuit breaker pattern for fault tolerance
//!
//! Prevents cascading failures by failing fast while a dependency is down and
//! probing it with a bounded number of calls once a recovery timeout passes.
//!
//! ```text
//! Closed   --[failures >= threshold]---------------> Open
//! Open     --[timeout elapsed, on next gate check]--> HalfOpen
//! HalfOpen --[successes >= success_threshold]-------> Closed
//! HalfOpen --[any failure]--------------------------> Open
//! ```

#[allow(clippy::module_inception)]
mod breaker;
mod classifier;
mod config;
mod listeners;
mod manager;
mod types;


// Re-export all public items
pub use breaker::{Breaker, Permit};
pub use classifier::{
    FailureClassifier, HttpStatus, StatusError, http_status_of, http_status_of_type, is_server_error,
    is_server_or_throttle,
};
pub use config::{
    BreakerConfig, DEFAULT_HALF_OPEN_MAX_REQUESTS, DEFAULT_SUCCESS_THRESHOLD, DEFAULT_THRESHOLD,
    DEFAULT_TIMEOUT, ListenerPanicHook, StateListener,
};
pub use listeners::{LISTENER_QUEUE_CAPACITY, ListenerId};
pub use manager::BreakerManager;
pub use types::{BreakerError, BreakerStats, CircuitState, Rejection, StateChange};
