//! Breaker configuration and presets
//!
//! ```
//! use breakwater_core::breaker::{BreakerConfig, FailureClassifier};
//! use std::time::Duration;
//!
//! // Preset first, caller overrides on top
//! let config = BreakerConfig::aggressive()
//!     .with_name("payments")
//!     .with_timeout(Duration::from_secs(5))
//!     .with_classifier(FailureClassifier::http_server_or_throttle());
//! assert_eq!(config.threshold, 3);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::classifier::FailureClassifier;
use super::types::StateChange;
use crate::clock::{Clock, SystemClock};

/// Default number of failures before the circuit opens
pub const DEFAULT_THRESHOLD: u32 = 5;
/// Default time spent open before probing
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default number of concurrent probes while half-open
pub const DEFAULT_HALF_OPEN_MAX_REQUESTS: u32 = 3;
/// Default number of successful probes needed to close
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Callback invoked for every committed state transition
pub type StateListener = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// Callback invoked when a state listener panics, with the panic message
pub type ListenerPanicHook = Arc<dyn Fn(&StateChange, &str) + Send + Sync>;

/// Configuration for circuit breaker behavior
#[derive(Clone)]
pub struct BreakerConfig {
    /// Name used in logs and state-change events
    pub name: String,
    /// Failures counted while closed before the circuit opens
    pub threshold: u32,
    /// How long the circuit stays open before a probe is allowed
    pub timeout: Duration,
    /// Maximum concurrent probes in half-open state
    pub half_open_max_requests: u32,
    /// Successful probes needed in half-open state to close
    pub success_threshold: u32,
    /// Decides which errors count as failures
    pub classifier: FailureClassifier,
    /// Listener registered when the breaker is built
    pub on_state_change: Option<StateListener>,
    /// Told about listeners that panic
    pub on_listener_panic: Option<ListenerPanicHook>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            threshold: DEFAULT_THRESHOLD,
            timeout: DEFAULT_TIMEOUT,
            half_open_max_requests: DEFAULT_HALF_OPEN_MAX_REQUESTS,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            classifier: FailureClassifier::any_error(),
            on_state_change: None,
            on_listener_panic: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for BreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerConfig")
            .field("name", &self.name)
            .field("threshold", &self.threshold)
            .field("timeout", &self.timeout)
            .field("half_open_max_requests", &self.half_open_max_requests)
            .field("success_threshold", &self.success_threshold)
            .field("classifier", &self.classifier)
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_listener_panic", &self.on_listener_panic.is_some())
            .finish_non_exhaustive()
    }
}

impl BreakerConfig {
    /// Create a config for aggressive circuit breaking
    pub fn aggressive() -> Self {
        Self {
            threshold: 3,
            timeout: Duration::from_secs(15),
            half_open_max_requests: 1,
            success_threshold: 2,
            ..Self::default()
        }
    }

    /// Create a config for conservative circuit breaking
    pub fn conservative() -> Self {
        Self {
            threshold: 10,
            timeout: Duration::from_secs(60),
            half_open_max_requests: 5,
            success_threshold: 5,
            ..Self::default()
        }
    }

    /// Create a config for a plain HTTP API: only 429/5xx count.
    ///
    /// Statuses are read from [`StatusError`](super::StatusError) (and
    /// `reqwest::Error` with the `reqwest` feature). For your own error type,
    /// swap in [`FailureClassifier::http_server_or_throttle_for`].
    pub fn for_http_api() -> Self {
        Self {
            classifier: FailureClassifier::http_server_or_throttle(),
            ..Self::default()
        }
    }

    /// Create a config tuned for an LLM provider.
    ///
    /// Hosted providers see natural latency variance and transient overload,
    /// so they get a lenient budget. A local `ollama` server either runs or
    /// doesn't, so it trips fast and is probed often.
    pub fn for_llm_provider(provider: &str) -> Self {
        let base = Self {
            name: format!("llm_{}", provider),
            classifier: FailureClassifier::http_server_or_throttle(),
            ..Self::default()
        };

        match provider {
            "ollama" => Self {
                threshold: 3,
                timeout: Duration::from_secs(10),
                half_open_max_requests: 1,
                success_threshold: 1,
                ..base
            },
            _ => Self {
                threshold: 5,
                timeout: Duration::from_secs(30),
                half_open_max_requests: 2,
                success_threshold: 2,
                ..base
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_half_open_max_requests(mut self, max: u32) -> Self {
        self.half_open_max_requests = max;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Register a listener at construction time
    pub fn with_on_state_change<F>(mut self, listener: F) -> Self
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(listener));
        self
    }

    pub fn with_on_listener_panic<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StateChange, &str) + Send + Sync + 'static,
    {
        self.on_listener_panic = Some(Arc::new(hook));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Clamp zero counts to 1; returns the names of clamped fields
    pub(crate) fn normalize(&mut self) -> Vec<&'static str> {
        let mut clamped = Vec::new();
        for (field, value) in [
            ("threshold", &mut self.threshold),
            ("half_open_max_requests", &mut self.half_open_max_requests),
            ("success_threshold", &mut self.success_threshold),
        ] {
            if *value == 0 {
                *value = 1;
                clamped.push(field);
            }
        }
        clamped
    }
}
