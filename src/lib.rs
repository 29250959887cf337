//! Breakwater: circuit breakers for calls to dependencies that fail
//!
//! ```
//! use breakwater::{Breaker, BreakerConfig, BreakerError, CircuitState, Rejection};
//!
//! let breaker = Breaker::new(BreakerConfig::default().with_threshold(1));
//!
//! let failed: Result<(), _> = breaker.execute(|| Err(std::io::Error::other("refused")));
//! assert!(matches!(failed, Err(BreakerError::Inner(_))));
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let rejected: Result<(), BreakerError<std::io::Error>> = breaker.execute(|| Ok(()));
//! assert_eq!(rejected.unwrap_err().rejection(), Some(Rejection::CircuitOpen));
//! ```

pub mod logging;

pub use breakwater_core::*;
pub use logging::{LogFormat, LoggingConfig, init_logging};
