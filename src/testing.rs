//! Testing utilities for code guarded by resilience policies.
//!
//! This module provides scripted failing work, a small error type with a
//! retryable/permanent split, assertion macros for the executor errors, and
//! property-based testing strategies.
//!
//! # Examples
//!
//! ## FlakyWork
//!
//! ```rust
//! use resilient::testing::FlakyWork;
//! use resilient::{RetryPolicy, Retrier};
//!
//! let work = FlakyWork::failing_times(2, "ok");
//! let retrier = Retrier::new(RetryPolicy::new("demo", 3)).unwrap();
//!
//! assert_eq!(retrier.execute(|| work.call()).unwrap(), "ok");
//! assert_eq!(work.calls(), 3);
//! ```
//!
//! ## Assertion Macros
//!
//! ```rust
//! use resilient::testing::FlakyWork;
//! use resilient::{assert_exhausted, RetryPolicy, Retrier};
//!
//! let work = FlakyWork::failing_times(5, ());
//! let retrier = Retrier::new(RetryPolicy::new("demo", 3)).unwrap();
//!
//! assert_exhausted!(retrier.execute(|| work.call()), 3);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::predicate::FailurePredicate;

/// Error produced by [`FlakyWork`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestError {
    /// A failure worth retrying.
    Transient(String),
    /// A failure that will never go away.
    Permanent(String),
}

impl TestError {
    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Create a permanent error.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    /// Returns true for [`TestError::Transient`].
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "transient failure: {}", msg),
            Self::Permanent(msg) => write!(f, "permanent failure: {}", msg),
        }
    }
}

impl std::error::Error for TestError {}

/// A predicate accepting only transient [`TestError`]s anywhere in the error chain.
pub fn transient_only() -> FailurePredicate {
    FailurePredicate::new(|err| {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
        while let Some(e) = current {
            if let Some(test_error) = e.downcast_ref::<TestError>() {
                return test_error.is_transient();
            }
            current = e.source();
        }
        false
    })
}

type Outcome<T> = dyn Fn(u32) -> Result<T, TestError> + Send + Sync;

/// Work with a scripted sequence of outcomes and an invocation counter.
///
/// Every call is counted; the outcome of call `n` (1-based) comes from the
/// script. `FlakyWork` is `Send + Sync`, so it can be shared through an `Arc`
/// with worker threads and tasks.
pub struct FlakyWork<T> {
    calls: AtomicU32,
    latency: Option<Duration>,
    outcome: Box<Outcome<T>>,
}

impl<T: Clone + Send + Sync + 'static> FlakyWork<T> {
    /// Fail transiently on the first `failures` calls, then return `value`.
    pub fn failing_times(failures: u32, value: T) -> Self {
        Self::from_fn(move |call| {
            if call <= failures {
                Err(TestError::transient(format!("failure {}", call)))
            } else {
                Ok(value.clone())
            }
        })
    }

    /// Replay `script`, repeating its last entry once it runs out.
    ///
    /// # Panics
    ///
    /// Panics if `script` is empty.
    pub fn scripted(script: Vec<Result<T, TestError>>) -> Self {
        assert!(!script.is_empty(), "FlakyWork script must not be empty");
        Self::from_fn(move |call| {
            let index = (call as usize - 1).min(script.len() - 1);
            script[index].clone()
        })
    }
}

impl FlakyWork<()> {
    /// Fail permanently on the first `failures` calls, then succeed.
    pub fn failing_permanently(failures: u32) -> Self {
        Self::from_fn(move |call| {
            if call <= failures {
                Err(TestError::permanent(format!("failure {}", call)))
            } else {
                Ok(())
            }
        })
    }
}

impl<T> FlakyWork<T> {
    /// Build work from an outcome function receiving the 1-based call number.
    pub fn from_fn<F>(outcome: F) -> Self
    where
        F: Fn(u32) -> Result<T, TestError> + Send + Sync + 'static,
    {
        Self {
            calls: AtomicU32::new(0),
            latency: None,
            outcome: Box::new(outcome),
        }
    }

    /// Make every call take `latency` before producing its outcome.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Result<T, TestError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.outcome)(call)
    }

    /// Blocking call, sleeping the thread for the configured latency.
    pub fn call(&self) -> Result<T, TestError> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        self.next_outcome()
    }

    /// Async call, suspending for the configured latency.
    #[cfg(feature = "async")]
    pub async fn call_async(&self) -> Result<T, TestError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.next_outcome()
    }
}

impl<T> fmt::Debug for FlakyWork<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlakyWork")
            .field("calls", &self.calls())
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

/// Assert that a result failed because a deadline elapsed.
///
/// Works with any error type exposing `is_timeout()`.
///
/// # Example
///
/// ```rust
/// use resilient::{assert_timed_out, TimeoutError};
/// use std::time::Duration;
///
/// let result: Result<(), TimeoutError<String>> =
///     Err(TimeoutError::timeout("db", Duration::from_millis(5)));
/// assert_timed_out!(result);
/// ```
#[macro_export]
macro_rules! assert_timed_out {
    ($result:expr) => {
        match $result {
            Err(ref e) if e.is_timeout() => {}
            other => panic!("Expected timeout, got {:?}", other),
        }
    };
}

/// Assert that a result failed with an exhausted retry budget of `$attempts` attempts.
///
/// Works with any error type exposing `exhausted()`.
#[macro_export]
macro_rules! assert_exhausted {
    ($result:expr, $attempts:expr) => {
        match $result {
            Err(ref e) => match e.exhausted() {
                Some(exhausted) => assert_eq!(
                    exhausted.attempts().len(),
                    $attempts,
                    "unexpected attempt count"
                ),
                None => panic!("Expected exhausted retries, got {:?}", e),
            },
            Ok(ref v) => panic!("Expected exhausted retries, got Ok({:?})", v),
        }
    };
}

/// Property-based testing strategies for policies.
#[cfg(feature = "proptest")]
pub mod strategies {
    use proptest::prelude::*;
    use std::time::Duration;

    use crate::{RetryPolicy, TimeoutPolicy};

    /// Valid timeout policies with durations between 1ms and 10s.
    pub fn timeout_policy() -> impl Strategy<Value = TimeoutPolicy> {
        (1u64..10_000).prop_filter_map("valid timeout policy", |millis| {
            TimeoutPolicy::new("generated", Duration::from_millis(millis)).ok()
        })
    }

    /// Valid retry policies with zero delay and 1 to 10 attempts.
    pub fn retry_policy() -> impl Strategy<Value = RetryPolicy> {
        (1u32..=10).prop_map(|attempts| RetryPolicy::new("generated", attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RetryError, RetryExhausted, TimeoutError};

    #[test]
    fn failing_times_counts_calls() {
        let work = FlakyWork::failing_times(2, 42);
        assert_eq!(work.call(), Err(TestError::transient("failure 1")));
        assert_eq!(work.call(), Err(TestError::transient("failure 2")));
        assert_eq!(work.call(), Ok(42));
        assert_eq!(work.calls(), 3);
    }

    #[test]
    fn scripted_repeats_last_entry() {
        let work = FlakyWork::scripted(vec![Err(TestError::permanent("x")), Ok(1)]);
        assert!(work.call().is_err());
        assert_eq!(work.call(), Ok(1));
        assert_eq!(work.call(), Ok(1));
    }

    #[test]
    fn transient_only_classifies_test_errors() {
        let predicate = transient_only();
        assert!(predicate.test(&TestError::transient("a")));
        assert!(!predicate.test(&TestError::permanent("b")));

        let wrapped = TimeoutError::Inner(TestError::transient("c"));
        assert!(predicate.test(&wrapped));
    }

    #[test]
    fn assert_timed_out_macro() {
        let result: Result<(), TimeoutError<TestError>> =
            Err(TimeoutError::timeout("t", Duration::from_millis(1)));
        assert_timed_out!(result);
    }

    #[test]
    #[should_panic(expected = "Expected timeout")]
    fn assert_timed_out_panics_on_inner_error() {
        let result: Result<(), TimeoutError<TestError>> =
            Err(TimeoutError::Inner(TestError::permanent("x")));
        assert_timed_out!(result);
    }

    #[test]
    fn assert_exhausted_macro() {
        let attempts = vec![crate::Attempt::new(1, TestError::transient("x"), Duration::ZERO)];
        let result: Result<(), RetryError<TestError>> = Err(RetryError::Exhausted(
            RetryExhausted::new("r", attempts, Duration::ZERO),
        ));
        assert_exhausted!(result, 1);
    }

    #[test]
    #[should_panic(expected = "Expected exhausted retries")]
    fn assert_exhausted_panics_on_success() {
        let result: Result<u8, RetryError<TestError>> = Ok(1);
        assert_exhausted!(result, 1);
    }

    #[cfg(feature = "proptest")]
    mod proptest_tests {
        use super::super::strategies;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn generated_policies_validate(policy in strategies::retry_policy()) {
                prop_assert!(policy.validate().is_ok());
            }

            #[test]
            fn generated_timeouts_are_positive(policy in strategies::timeout_policy()) {
                prop_assert!(!policy.duration().is_zero());
            }
        }
    }
}
