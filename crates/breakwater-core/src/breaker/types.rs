//! Circuit breaker states, rejections and statistics

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CircuitState {
    /// Circuit is closed, operations proceed normally
    #[default]
    Closed = 0,
    /// Circuit is open, operations are rejected
    Open = 1,
    /// Circuit is half-open, limited operations allowed to test recovery
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn as_tag(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_tag(tag: u8) -> Self {
        match tag {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }

    /// Lowercase name used in logs and status output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the gate refused a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The breaker is open and the recovery timeout has not elapsed
    #[error("circuit breaker is open")]
    CircuitOpen,
    /// The breaker is half-open and every probe slot is taken
    #[error("too many requests while circuit breaker is half-open")]
    TooManyRequests,
}

/// Error from a call made through a breaker
///
/// `Inner` carries the operation's own error exactly as it was returned.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The gate refused the call; the operation never ran
    Rejected(Rejection),
    /// The operation ran and failed
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Whether the gate refused the call
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The rejection, if the gate refused the call
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(rejection) => Some(*rejection),
            Self::Inner(_) => None,
        }
    }

    /// Borrow the operation's error
    pub fn inner(&self) -> Option<&E> {
        match self {
            Self::Rejected(_) => None,
            Self::Inner(e) => Some(e),
        }
    }

    /// Take the operation's error
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Rejected(_) => None,
            Self::Inner(e) => Some(e),
        }
    }
}

impl<E> From<Rejection> for BreakerError<E> {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(rejection) => write!(f, "{}", rejection),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Inner(e) => Some(e),
        }
    }
}

/// A committed state transition, as delivered to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// Name of the breaker that changed
    pub name: String,
    /// State before the transition
    pub from: CircuitState,
    /// State after the transition
    pub to: CircuitState,
    /// When the transition committed, per the breaker's clock
    pub at: Instant,
}

/// Statistics for a circuit breaker
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerStats {
    pub state: CircuitState,
    /// Failures counted toward the threshold while closed
    pub failure_count: u32,
    /// Successful probes while half-open
    pub success_count: u32,
    /// Probes currently admitted while half-open
    pub half_open_in_flight: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
    pub last_failure_at: Option<Instant>,
    pub opened_at: Option<Instant>,
}

impl BreakerStats {
    /// Calculate failure rate as a percentage of recorded calls
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            (self.total_failures as f64 / self.total_calls as f64) * 100.0
        }
    }
}
