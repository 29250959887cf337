//! Circuit breaker implementation

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::config::BreakerConfig;
use super::listeners::{ListenerId, Listeners};
use super::types::{BreakerError, BreakerStats, CircuitState, Rejection, StateChange};

/// Mutable breaker state. Every field changes under one lock so a reader
/// never sees a new state with old counters.
#[derive(Debug, Default)]
struct Counters {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_in_flight: u32,
    /// Bumped on every transition and reset
    generation: u64,
    opened_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    total_calls: u64,
    total_failures: u64,
    total_rejections: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    /// Admitted but never reported (panic, dropped future)
    Abandoned,
}

/// Circuit breaker for protecting against failing dependencies
pub struct Breaker {
    config: BreakerConfig,
    /// Mirror of `counters.state` for lock-free reads
    state_tag: AtomicU8,
    counters: Mutex<Counters>,
    listeners: Listeners,
}

impl Breaker {
    /// Create a circuit breaker from a config.
    ///
    /// Zero thresholds and budgets are raised to 1.
    pub fn new(mut config: BreakerConfig) -> Self {
        let clamped = config.normalize();
        if !clamped.is_empty() {
            tracing::warn!(
                circuit = %config.name,
                fields = ?clamped,
                "Zero-valued breaker settings raised to 1"
            );
        }

        let listeners = Listeners::new(config.name.clone(), config.on_listener_panic.clone());
        if let Some(listener) = config.on_state_change.clone() {
            listeners.add(listener);
        }

        Self {
            config,
            state_tag: AtomicU8::new(CircuitState::Closed.as_tag()),
            counters: Mutex::new(Counters::default()),
            listeners,
        }
    }

    /// Get the breaker name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The config this breaker was built with, after zero values were raised
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state. Never blocks and never transitions; an expired open
    /// circuit moves to half-open on the next gate check.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_tag(self.state_tag.load(Ordering::Acquire))
    }

    /// Ask whether a call may proceed.
    ///
    /// An admitted call must be followed by [`record_success`](Self::record_success),
    /// [`record_failure`](Self::record_failure) or [`record_error`](Self::record_error);
    /// in half-open state it holds a probe slot until then.
    pub fn allow(&self) -> Result<(), Rejection> {
        self.admit().map(|_| ())
    }

    /// Like [`allow`](Self::allow) but returns a permit that reports the
    /// outcome. Dropping the permit unreported releases its probe slot
    /// without counting anything.
    pub fn try_acquire(&self) -> Result<Permit<'_>, Rejection> {
        let generation = self.admit()?;
        Ok(Permit {
            breaker: self,
            generation,
            finished: false,
        })
    }

    /// Run a synchronous operation through the breaker.
    ///
    /// The operation's error is returned untouched inside
    /// [`BreakerError::Inner`].
    pub fn execute<T, E, F>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + 'static,
    {
        let permit = self.try_acquire()?;
        let result = operation();
        permit.record(&result);
        result.map_err(BreakerError::Inner)
    }

    /// Run an async operation through the breaker.
    ///
    /// If the returned future is dropped before completion the probe slot is
    /// released and no outcome is counted.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let permit = self.try_acquire()?;
        let result = operation().await;
        permit.record(&result);
        result.map_err(BreakerError::Inner)
    }

    /// Run an async operation that takes a cancellation token.
    ///
    /// The breaker does not watch the token itself; honoring it is up to the
    /// operation. A cancelled operation reports whatever error it returns.
    pub async fn call_with_token<T, E, F, Fut>(
        &self,
        token: &CancellationToken,
        operation: F,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let token = token.clone();
        self.call(move || operation(token)).await
    }

    /// Record a successful operation
    pub fn record_success(&self) {
        self.complete(None, Outcome::Success);
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        self.complete(None, Outcome::Failure);
    }

    /// Record an error, letting the classifier decide whether it counts
    pub fn record_error(&self, err: &(dyn Error + 'static)) {
        self.complete(None, self.classify(err));
    }

    /// Whether the configured classifier counts `err` as a failure
    pub fn is_failure(&self, err: &(dyn Error + 'static)) -> bool {
        self.config.classifier.is_failure(err)
    }

    /// Register a state-change listener
    pub fn on_state_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    /// Unregister a listener; false if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Number of registered state-change listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Get circuit breaker statistics
    pub fn stats(&self) -> BreakerStats {
        let c = self.counters.lock();
        BreakerStats {
            state: c.state,
            failure_count: c.failure_count,
            success_count: c.success_count,
            half_open_in_flight: c.half_open_in_flight,
            total_calls: c.total_calls,
            total_failures: c.total_failures,
            total_rejections: c.total_rejections,
            last_failure_at: c.last_failure_at,
            opened_at: c.opened_at,
        }
    }

    /// Force the breaker back to a fresh closed state, whatever it was doing.
    /// Outstanding permits become stale and their outcomes are ignored.
    pub fn reset(&self) {
        let now = self.config.clock.now();
        let mut c = self.counters.lock();
        let from = c.state;
        let generation = c.generation;

        *c = Counters {
            generation: generation + 1,
            ..Counters::default()
        };
        self.state_tag
            .store(CircuitState::Closed.as_tag(), Ordering::Release);

        tracing::info!(circuit = %self.config.name, from = %from, "Circuit breaker reset");
        if from != CircuitState::Closed {
            self.publish(from, CircuitState::Closed, now);
        }
    }

    /// Manually open the circuit breaker
    pub fn trip(&self) {
        let now = self.config.clock.now();
        let mut c = self.counters.lock();
        let from = c.state;
        self.apply(&mut c, from, CircuitState::Open, now);
    }

    fn classify(&self, err: &(dyn Error + 'static)) -> Outcome {
        if self.is_failure(err) {
            Outcome::Failure
        } else {
            Outcome::Success
        }
    }

    /// Gate check. Returns the generation the call was admitted under.
    fn admit(&self) -> Result<u64, Rejection> {
        let now = self.config.clock.now();
        let mut c = self.counters.lock();

        if c.state == CircuitState::Open {
            let opened_at = c.opened_at.unwrap_or(now);
            if now.saturating_duration_since(opened_at) < self.config.timeout {
                c.total_rejections += 1;
                tracing::debug!(circuit = %self.config.name, "Rejecting call, circuit open");
                return Err(Rejection::CircuitOpen);
            }
            // Whoever wins, admission below is decided on the current state
            self.transition(&mut c, CircuitState::Open, CircuitState::HalfOpen, now);
        }

        match c.state {
            CircuitState::Closed => Ok(c.generation),
            CircuitState::HalfOpen if c.half_open_in_flight < self.config.half_open_max_requests => {
                c.half_open_in_flight += 1;
                Ok(c.generation)
            }
            CircuitState::HalfOpen => {
                c.total_rejections += 1;
                tracing::debug!(
                    circuit = %self.config.name,
                    in_flight = c.half_open_in_flight,
                    "Rejecting call, half-open probe budget exhausted"
                );
                Err(Rejection::TooManyRequests)
            }
            CircuitState::Open => {
                c.total_rejections += 1;
                Err(Rejection::CircuitOpen)
            }
        }
    }

    /// Apply an outcome. `admitted_in` is the generation of the permit, or
    /// `None` for manual recording against whatever state is current.
    fn complete(&self, admitted_in: Option<u64>, outcome: Outcome) {
        let now = self.config.clock.now();
        let mut c = self.counters.lock();

        match outcome {
            Outcome::Success => c.total_calls += 1,
            Outcome::Failure => {
                c.total_calls += 1;
                c.total_failures += 1;
                c.last_failure_at = Some(now);
            }
            Outcome::Abandoned => {}
        }

        if admitted_in.is_some_and(|generation| generation != c.generation) {
            tracing::trace!(
                circuit = %self.config.name,
                "Ignoring outcome of a call admitted before the last transition"
            );
            return;
        }

        match c.state {
            CircuitState::Closed => match outcome {
                Outcome::Failure => {
                    c.failure_count = c.failure_count.saturating_add(1);
                    if c.failure_count >= self.config.threshold {
                        self.transition(&mut c, CircuitState::Closed, CircuitState::Open, now);
                    }
                }
                Outcome::Success => c.failure_count = 0,
                Outcome::Abandoned => {}
            },
            CircuitState::HalfOpen => {
                c.half_open_in_flight = c.half_open_in_flight.saturating_sub(1);
                match outcome {
                    Outcome::Failure => {
                        self.transition(&mut c, CircuitState::HalfOpen, CircuitState::Open, now);
                    }
                    Outcome::Success => {
                        c.success_count = c.success_count.saturating_add(1);
                        if c.success_count >= self.config.success_threshold {
                            self.transition(
                                &mut c,
                                CircuitState::HalfOpen,
                                CircuitState::Closed,
                                now,
                            );
                        }
                    }
                    Outcome::Abandoned => {}
                }
            }
            // Stragglers finishing after the circuit opened
            CircuitState::Open => {}
        }
    }

    /// Compare-and-set transition: applies only if the state is still `from`.
    fn transition(
        &self,
        c: &mut Counters,
        from: CircuitState,
        to: CircuitState,
        now: Instant,
    ) -> bool {
        if c.state != from {
            return false;
        }
        self.apply(c, from, to, now);
        true
    }

    fn apply(&self, c: &mut Counters, from: CircuitState, to: CircuitState, now: Instant) {
        c.state = to;
        c.generation += 1;
        c.success_count = 0;
        c.half_open_in_flight = 0;

        match to {
            CircuitState::Open => {
                c.opened_at = Some(now);
                tracing::warn!(
                    circuit = %self.config.name,
                    from = %from,
                    failures = c.failure_count,
                    timeout = ?self.config.timeout,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                tracing::info!(
                    circuit = %self.config.name,
                    "Circuit breaker transitioning to half-open"
                );
            }
            CircuitState::Closed => {
                c.failure_count = 0;
                c.opened_at = None;
                tracing::info!(circuit = %self.config.name, "Circuit breaker closed");
            }
        }

        self.state_tag.store(to.as_tag(), Ordering::Release);
        if from != to {
            self.publish(from, to, now);
        }
    }

    /// Enqueued while the counters are locked so events keep commit order
    fn publish(&self, from: CircuitState, to: CircuitState, at: Instant) {
        self.listeners.publish(StateChange {
            name: self.config.name.clone(),
            from,
            to,
            at,
        });
    }
}

impl Default for Breaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl fmt::Debug for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Admission to make one call through a [`Breaker`]
#[must_use = "dropping a permit without recording an outcome counts nothing"]
pub struct Permit<'a> {
    breaker: &'a Breaker,
    generation: u64,
    finished: bool,
}

impl Permit<'_> {
    /// Record that the call succeeded
    pub fn record_success(mut self) {
        self.finish(Outcome::Success);
    }

    /// Record that the call failed, bypassing the classifier
    pub fn record_failure(mut self) {
        self.finish(Outcome::Failure);
    }

    /// Record an error, letting the classifier decide whether it counts
    pub fn record_error(mut self, err: &(dyn Error + 'static)) {
        let outcome = self.breaker.classify(err);
        self.finish(outcome);
    }

    /// Record the result of the call
    pub fn record<T, E: Error + 'static>(self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.record_success(),
            Err(e) => self.record_error(e),
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.finished = true;
        self.breaker.complete(Some(self.generation), outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.breaker
                .complete(Some(self.generation), Outcome::Abandoned);
        }
    }
}

impl fmt::Debug for Permit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("breaker", &self.breaker.name())
            .field("generation", &self.generation)
            .finish()
    }
}
