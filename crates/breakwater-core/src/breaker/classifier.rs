//! Failure classification
//!
//! A classifier decides whether an error returned by a protected call counts
//! against the breaker. Client-side mistakes (a 404, a 400) say nothing about
//! the health of the dependency and should not trip it.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

type Predicate = dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync;

/// Errors that know which HTTP status produced them
pub trait HttpStatus {
    /// The status code, if the error came from an HTTP response
    fn http_status(&self) -> Option<u16>;
}

/// Minimal error carrying an HTTP status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    status: u16,
    message: String,
}

impl StatusError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.message)
    }
}

impl Error for StatusError {}

impl HttpStatus for StatusError {
    fn http_status(&self) -> Option<u16> {
        Some(self.status)
    }
}

#[cfg(feature = "reqwest")]
impl HttpStatus for reqwest::Error {
    fn http_status(&self) -> Option<u16> {
        self.status().map(|s| s.as_u16())
    }
}

/// Find the first HTTP status along an error's source chain, looking at the
/// built-in status carriers ([`StatusError`], and `reqwest::Error` with the
/// `reqwest` feature)
pub fn http_status_of(err: &(dyn Error + 'static)) -> Option<u16> {
    status_in_chain(err, builtin_status)
}

/// Like [`http_status_of`], but also asks the caller's own error type `E`
pub fn http_status_of_type<E>(err: &(dyn Error + 'static)) -> Option<u16>
where
    E: HttpStatus + Error + 'static,
{
    status_in_chain(err, |e| {
        e.downcast_ref::<E>()
            .and_then(HttpStatus::http_status)
            .or_else(|| builtin_status(e))
    })
}

fn status_in_chain<F>(err: &(dyn Error + 'static), status: F) -> Option<u16>
where
    F: Fn(&(dyn Error + 'static)) -> Option<u16>,
{
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = status(e) {
            return Some(found);
        }
        current = e.source();
    }
    None
}

fn builtin_status(e: &(dyn Error + 'static)) -> Option<u16> {
    if let Some(status) = e.downcast_ref::<StatusError>().and_then(HttpStatus::http_status) {
        return Some(status);
    }
    #[cfg(feature = "reqwest")]
    if let Some(status) = e
        .downcast_ref::<reqwest::Error>()
        .and_then(HttpStatus::http_status)
    {
        return Some(status);
    }
    None
}

/// 429 Too Many Requests or any 5xx
pub fn is_server_or_throttle(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// Any 5xx
pub fn is_server_error(status: u16) -> bool {
    (500..=599).contains(&status)
}

/// Predicate deciding whether an error counts as a breaker failure
#[derive(Clone)]
pub struct FailureClassifier {
    label: &'static str,
    predicate: Arc<Predicate>,
}

impl FailureClassifier {
    /// Wrap an arbitrary predicate
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        Self {
            label: "custom",
            predicate: Arc::new(predicate),
        }
    }

    /// Every error is a failure (the default)
    pub fn any_error() -> Self {
        Self {
            label: "any_error",
            predicate: Arc::new(|_: &(dyn Error + 'static)| true),
        }
    }

    /// Only 429 and 5xx responses count; other statuses are the caller's fault.
    /// Errors without a status (connect failures, resets) count.
    pub fn http_server_or_throttle() -> Self {
        Self::with_status("http_server_or_throttle", http_status_of, is_server_or_throttle)
    }

    /// Only 5xx responses count. Errors without a status count.
    pub fn http_server_errors() -> Self {
        Self::with_status("http_server_errors", http_status_of, is_server_error)
    }

    /// [`http_server_or_throttle`](Self::http_server_or_throttle) that also
    /// reads statuses from the caller's error type `E`
    pub fn http_server_or_throttle_for<E>() -> Self
    where
        E: HttpStatus + Error + 'static,
    {
        Self::with_status(
            "http_server_or_throttle",
            http_status_of_type::<E>,
            is_server_or_throttle,
        )
    }

    /// [`http_server_errors`](Self::http_server_errors) that also reads
    /// statuses from the caller's error type `E`
    pub fn http_server_errors_for<E>() -> Self
    where
        E: HttpStatus + Error + 'static,
    {
        Self::with_status("http_server_errors", http_status_of_type::<E>, is_server_error)
    }

    /// Classify by status code using a caller-supplied extractor.
    ///
    /// Errors for which `extract` finds no status are failures.
    pub fn with_status<X, P>(label: &'static str, extract: X, policy: P) -> Self
    where
        X: Fn(&(dyn Error + 'static)) -> Option<u16> + Send + Sync + 'static,
        P: Fn(u16) -> bool + Send + Sync + 'static,
    {
        Self {
            label,
            predicate: Arc::new(move |err: &(dyn Error + 'static)| {
                extract(err).is_none_or(&policy)
            }),
        }
    }

    /// Whether `err` counts against the breaker
    pub fn is_failure(&self, err: &(dyn Error + 'static)) -> bool {
        (self.predicate)(err)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::any_error()
    }
}

impl fmt::Debug for FailureClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FailureClassifier({})", self.label)
    }
}
