//! Time sources for breakers
//!
//! The breaker never reads the system clock directly; it asks its configured
//! [`Clock`]. Production code uses [`SystemClock`], tests drive a
//! [`ManualClock`] forward explicitly.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of monotonic timestamps
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
///
/// ```
/// use breakwater_core::clock::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_millis(150));
/// assert_eq!(clock.now() - start, Duration::from_millis(150));
/// ```
pub struct ManualClock {
    origin: Instant,
    offset_nanos: AtomicU64,
    /// Largest offset `origin` can absorb without overflowing `Instant`
    limit_nanos: u64,
}

/// Candidate ceilings for a manual clock's elapsed time, largest first
const ELAPSED_LIMITS: [Duration; 3] = [
    Duration::from_secs(100 * 365 * 24 * 60 * 60),
    Duration::from_secs(365 * 24 * 60 * 60),
    Duration::from_secs(24 * 60 * 60),
];

fn to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    pub fn new() -> Self {
        let origin = Instant::now();
        let limit = ELAPSED_LIMITS
            .into_iter()
            .find(|limit| origin.checked_add(*limit).is_some())
            .unwrap_or(Duration::ZERO);

        Self {
            origin,
            offset_nanos: AtomicU64::new(0),
            limit_nanos: to_nanos(limit),
        }
    }

    /// Move the clock forward. Saturates at the clock's ceiling instead of
    /// wrapping.
    pub fn advance(&self, by: Duration) {
        let nanos = to_nanos(by);
        let _ = self
            .offset_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(nanos).min(self.limit_nanos))
            });
    }

    /// Set the total elapsed time since the clock was created
    pub fn set_elapsed(&self, elapsed: Duration) {
        self.offset_nanos
            .store(to_nanos(elapsed).min(self.limit_nanos), Ordering::SeqCst);
    }

    /// Total elapsed time since the clock was created
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}
