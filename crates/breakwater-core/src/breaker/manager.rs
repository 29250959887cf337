//! Keyed registry of circuit breakers
//!
//! One breaker per downstream dependency, created on first use and kept for
//! the life of the manager. Keys are never evicted, so the key space should be
//! a small fixed set of dependency names rather than caller-controlled input.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::breaker::Breaker;
use super::config::BreakerConfig;
use super::types::{BreakerError, BreakerStats, CircuitState};

type Factory = dyn Fn(&str) -> Breaker + Send + Sync;

/// Collection of circuit breakers for multiple dependencies
pub struct BreakerManager {
    breakers: DashMap<String, Arc<Breaker>>,
    factory: Arc<Factory>,
}

impl BreakerManager {
    /// Create a manager that builds every breaker with `factory`
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Breaker + Send + Sync + 'static,
    {
        Self::with_keyed_factory(move |_| factory())
    }

    /// Create a manager whose factory sees the key, so breakers can be named
    /// and tuned per dependency
    pub fn with_keyed_factory<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Breaker + Send + Sync + 'static,
    {
        Self {
            breakers: DashMap::new(),
            factory: Arc::new(factory),
        }
    }

    /// Create a manager that clones `config` for every key, naming each
    /// breaker after its key
    pub fn with_config(config: BreakerConfig) -> Self {
        Self::with_keyed_factory(move |key| Breaker::new(config.clone().with_name(key)))
    }

    /// Get or create the circuit breaker for a dependency.
    ///
    /// The factory runs outside the map's locks. Two callers racing on a new
    /// key may both build a breaker; only the first insert is kept and both
    /// get that one.
    pub fn get(&self, key: &str) -> Arc<Breaker> {
        if let Some(existing) = self.breakers.get(key) {
            return Arc::clone(existing.value());
        }

        let candidate = Arc::new((self.factory)(key));
        let (retained, inserted) = match self.breakers.entry(key.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => (Arc::clone(entry.insert(candidate).value()), true),
        };

        if inserted {
            tracing::debug!(key = %key, circuit = %retained.name(), "Registered circuit breaker");
        }
        retained
    }

    /// Run a synchronous operation through the breaker for `key`
    pub fn execute<T, E, F>(&self, key: &str, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + 'static,
    {
        self.get(key).execute(operation)
    }

    /// Run an async operation through the breaker for `key`
    pub async fn call<T, E, F, Fut>(&self, key: &str, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let breaker = self.get(key);
        breaker.call(operation).await
    }

    /// Reset one breaker. Returns false (and creates nothing) for an unknown key.
    pub fn reset(&self, key: &str) -> bool {
        match self.lookup(key) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset all circuit breakers
    pub fn reset_all(&self) {
        for breaker in self.snapshot() {
            breaker.reset();
        }
    }

    /// Current state of every known breaker
    pub fn states(&self) -> HashMap<String, CircuitState> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    /// Get stats for all circuit breakers, sorted by key
    pub fn stats(&self) -> Vec<(String, BreakerStats)> {
        let mut breakers: Vec<(String, Arc<Breaker>)> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        breakers.sort_by(|a, b| a.0.cmp(&b.0));

        breakers
            .into_iter()
            .map(|(key, breaker)| (key, breaker.stats()))
            .collect()
    }

    /// Get all registered keys
    pub fn keys(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.breakers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<Arc<Breaker>> {
        self.breakers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Clone out the breakers so no map lock is held while they run
    fn snapshot(&self) -> Vec<Arc<Breaker>> {
        self.breakers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl Default for BreakerManager {
    fn default() -> Self {
        Self::with_config(BreakerConfig::default())
    }
}

impl fmt::Debug for BreakerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerManager")
            .field("breakers", &self.keys())
            .finish_non_exhaustive()
    }
}
