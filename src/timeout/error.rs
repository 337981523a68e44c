//! Error type for timed operations.

use std::time::Duration;

/// Error returned by a [`Timeouter`](crate::Timeouter).
///
/// Either the deadline elapsed, or the work failed on its own before the
/// deadline and its failure is carried unchanged in [`TimeoutError::Inner`].
///
/// # Examples
///
/// ```rust
/// use resilient::{TimeoutError, TimeoutPolicy, Timeouter};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let timeouter = Timeouter::new(TimeoutPolicy::new("slow", Duration::from_millis(10)).unwrap());
///
/// let result = timeouter
///     .execute_async(async {
///         tokio::time::sleep(Duration::from_secs(10)).await;
///         Ok::<_, std::io::Error>(42)
///     })
///     .await;
///
/// match result {
///     Err(TimeoutError::Timeout { policy, duration }) => {
///         assert_eq!(policy, "slow");
///         assert_eq!(duration, Duration::from_millis(10));
///     }
///     _ => panic!("Expected timeout"),
/// }
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError<E> {
    /// The deadline elapsed before the work finished.
    Timeout {
        /// Name of the policy that was exceeded.
        policy: String,
        /// The configured duration.
        duration: Duration,
    },
    /// The work failed before the deadline.
    Inner(E),
}

impl<E> TimeoutError<E> {
    /// Create a timeout error.
    pub fn timeout(policy: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            policy: policy.into(),
            duration,
        }
    }

    /// Create an inner error.
    pub fn inner(error: E) -> Self {
        Self::Inner(error)
    }

    /// Returns true if the deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the work failed on its own.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Name of the policy whose deadline elapsed.
    pub fn policy(&self) -> Option<&str> {
        match self {
            Self::Timeout { policy, .. } => Some(policy),
            Self::Inner(_) => None,
        }
    }

    /// Get the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Timeout { .. } => None,
        }
    }

    /// Transform the inner error, keeping timeouts as they are.
    pub fn map_inner<F, E2>(self, f: F) -> TimeoutError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Self::Timeout { policy, duration } => TimeoutError::Timeout { policy, duration },
            Self::Inner(e) => TimeoutError::Inner(f(e)),
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for TimeoutError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { policy, duration } => write!(
                f,
                "timeout policy '{}' exceeded: no result within {:?}",
                policy, duration
            ),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TimeoutError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timeout { .. } => None,
            Self::Inner(e) => Some(e),
        }
    }
}
