//! Error types for retry operations.

use std::fmt;
use std::time::Duration;

/// One failed execution try, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt<E> {
    /// 1-based attempt index.
    pub index: u32,
    /// The failure of this attempt.
    pub error: E,
    /// Time spent in this attempt, delays excluded.
    pub elapsed: Duration,
}

impl<E> Attempt<E> {
    /// Record an attempt.
    pub fn new(index: u32, error: E, elapsed: Duration) -> Self {
        Self {
            index,
            error,
            elapsed,
        }
    }
}

/// Error returned when every attempt allowed by a policy has failed.
///
/// Carries the full attempt history in order. The `Display` output lists every
/// attempt's error type, message and duration.
///
/// # Examples
///
/// ```rust
/// use resilient::{RetryError, RetryPolicy, Retrier};
/// use std::io;
///
/// let retrier = Retrier::new(RetryPolicy::new("flaky", 3)).unwrap();
/// let result = retrier.execute(|| Err::<(), _>(io::Error::new(io::ErrorKind::Other, "down")));
///
/// match result {
///     Err(RetryError::Exhausted(exhausted)) => {
///         assert_eq!(exhausted.attempts().len(), 3);
///         assert_eq!(exhausted.last_error().to_string(), "down");
///     }
///     _ => panic!("Expected exhaustion"),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    policy: String,
    attempts: Vec<Attempt<E>>,
    total_duration: Duration,
}

impl<E> RetryExhausted<E> {
    /// Create a new exhaustion error. `attempts` must not be empty.
    pub fn new(policy: impl Into<String>, attempts: Vec<Attempt<E>>, total_duration: Duration) -> Self {
        debug_assert!(!attempts.is_empty());
        Self {
            policy: policy.into(),
            attempts,
            total_duration,
        }
    }

    /// Name of the exhausted policy.
    pub fn policy(&self) -> &str {
        &self.policy
    }

    /// Every failed attempt, in execution order.
    pub fn attempts(&self) -> &[Attempt<E>] {
        &self.attempts
    }

    /// Total time from the first attempt to giving up, delays included.
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// The failure of the final attempt.
    pub fn last_error(&self) -> &E {
        &self.last_attempt().error
    }

    /// Extract the final error, discarding the history.
    pub fn into_last_error(mut self) -> E {
        match self.attempts.pop() {
            Some(attempt) => attempt.error,
            None => unreachable!("RetryExhausted always records at least one attempt"),
        }
    }

    /// Extract the full attempt history.
    pub fn into_attempts(self) -> Vec<Attempt<E>> {
        self.attempts
    }

    fn last_attempt(&self) -> &Attempt<E> {
        match self.attempts.last() {
            Some(attempt) => attempt,
            None => unreachable!("RetryExhausted always records at least one attempt"),
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "retry policy '{}' exhausted after {} attempts in {:?}",
            self.policy,
            self.attempts.len(),
            self.total_duration
        )?;
        let type_name = std::any::type_name::<E>();
        for attempt in &self.attempts {
            write!(
                f,
                "\n  attempt {} failed after {:?}: {}: {}",
                attempt.index, attempt.elapsed, type_name, attempt.error
            )?;
        }
        Ok(())
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.last_error())
    }
}

/// Error returned by a [`Retrier`](crate::Retrier).
///
/// A failure the policy does not classify as retryable is returned as
/// [`RetryError::NonRetryable`], carrying the original error untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every allowed attempt failed.
    Exhausted(RetryExhausted<E>),
    /// The failure was not eligible for retry and was surfaced as is.
    NonRetryable(E),
}

impl<E> RetryError<E> {
    /// Returns true if the attempt budget was spent.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// Returns true if a non-retryable failure cut the retries short.
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, Self::NonRetryable(_))
    }

    /// The exhaustion details, if the budget was spent.
    pub fn exhausted(&self) -> Option<&RetryExhausted<E>> {
        match self {
            Self::Exhausted(exhausted) => Some(exhausted),
            Self::NonRetryable(_) => None,
        }
    }

    /// The most recent failure.
    pub fn last_error(&self) -> &E {
        match self {
            Self::Exhausted(exhausted) => exhausted.last_error(),
            Self::NonRetryable(e) => e,
        }
    }

    /// Extract the most recent failure.
    pub fn into_last_error(self) -> E {
        match self {
            Self::Exhausted(exhausted) => exhausted.into_last_error(),
            Self::NonRetryable(e) => e,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted(exhausted) => write!(f, "{}", exhausted),
            Self::NonRetryable(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Exhausted(exhausted) => exhausted.source(),
            Self::NonRetryable(e) => e.source(),
        }
    }
}
