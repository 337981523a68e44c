//! Retry policy types and configuration.

use std::time::Duration;

use crate::error::{ConfigError, PolicyKind};
use crate::predicate::FailurePredicate;

/// A named retry policy describing how failed calls are re-attempted.
///
/// Policies are pure data: they describe the attempt budget and the delays
/// between attempts, and a [`Retrier`](crate::Retrier) executes them. A policy
/// is immutable once it is handed to an executor.
///
/// # Attempts and delays
///
/// `max_attempts` counts every execution, including the first one. After
/// attempt `n` fails (1-based) the executor waits
/// `delay * delay_multiplier^(n - 1)`, or a fixed `delay` when no multiplier is
/// set, optionally capped by `max_delay`.
///
/// # Examples
///
/// ```rust
/// use resilient::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new("payments", 4)
///     .with_delay(Duration::from_millis(100))
///     .with_delay_multiplier(2.0);
///
/// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(100)));
/// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(200)));
/// assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(400)));
/// assert_eq!(policy.delay_for_attempt(4), None); // budget spent
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    name: String,
    max_attempts: u32,
    delay: Duration,
    delay_multiplier: Option<f64>,
    max_delay: Option<Duration>,
    jitter: JitterStrategy,
    failure_predicate: FailurePredicate,
}

/// Strategy for adding randomness to delays.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JitterStrategy {
    /// No jitter applied.
    #[default]
    None,
    /// Add ±percentage randomness to delay.
    Proportional(f64),
    /// Random delay between 0 and calculated delay (AWS recommended).
    Full,
    /// Decorrelated jitter (AWS style).
    Decorrelated,
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` executions with no delay
    /// between them. Every failure is retryable until a predicate is set.
    pub fn new(name: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            name: name.into(),
            max_attempts,
            delay: Duration::ZERO,
            delay_multiplier: None,
            max_delay: None,
            jitter: JitterStrategy::None,
            failure_predicate: FailurePredicate::always(),
        }
    }

    /// Set the total number of attempts, including the first.
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Grow the delay geometrically: `delay * multiplier^(attempt - 1)`.
    ///
    /// ```rust
    /// use resilient::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new("search", 5)
    ///     .with_delay(Duration::from_millis(10))
    ///     .with_delay_multiplier(3.0);
    ///
    /// assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(90)));
    /// ```
    pub fn with_delay_multiplier(mut self, multiplier: f64) -> Self {
        self.delay_multiplier = Some(multiplier);
        self
    }

    /// Set the maximum delay cap.
    ///
    /// Delays will never exceed this value, regardless of the multiplier.
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Add proportional jitter to delays.
    ///
    /// The factor determines the range of randomness. For example, `0.25` means
    /// the actual delay will be ±25% of the calculated delay. Factors outside
    /// `[0, 1]` are rejected by [`validate`](RetryPolicy::validate).
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this method does nothing.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = JitterStrategy::Proportional(factor);
        self
    }

    /// Use full jitter: a random delay between 0 and the calculated delay.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this method does nothing.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Full;
        self
    }

    /// Use decorrelated jitter: random between the base and 3x the previous delay.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this method does nothing.
    pub fn with_decorrelated_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Decorrelated;
        self
    }

    /// Only retry failures accepted by `predicate`.
    ///
    /// Rejected failures are surfaced immediately, whatever the attempt index.
    pub fn retry_if(mut self, predicate: FailurePredicate) -> Self {
        self.failure_predicate = predicate;
        self
    }

    /// The lookup key of this policy.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Base delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Backoff multiplier, if any.
    pub fn delay_multiplier(&self) -> Option<f64> {
        self.delay_multiplier
    }

    /// Get the maximum delay cap.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Get the jitter strategy.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// The classifier deciding which failures are retryable.
    pub fn failure_predicate(&self) -> &FailurePredicate {
        &self.failure_predicate
    }

    /// Delay to wait after attempt `attempt` (1-based) failed.
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }

        let base_delay = match self.delay_multiplier {
            None => self.delay,
            Some(multiplier) => {
                let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
                let secs = self.delay.as_secs_f64() * multiplier.powi(exponent);
                Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
            }
        };

        let capped = match self.max_delay {
            Some(max) => base_delay.min(max),
            None => base_delay,
        };

        Some(capped)
    }

    /// Calculate the delay with jitter applied.
    ///
    /// This is used internally by the retry executor.
    #[doc(hidden)]
    pub fn delay_with_jitter(
        &self,
        attempt: u32,
        prev_delay: Option<Duration>,
    ) -> Option<Duration> {
        let base_delay = self.delay_for_attempt(attempt)?;
        Some(self.jitter.apply(base_delay, prev_delay, self.max_delay))
    }

    /// Check the invariants an executor relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::invalid(
                PolicyKind::Retry,
                &self.name,
                "name must not be empty",
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                PolicyKind::Retry,
                &self.name,
                "max_attempts must be at least 1",
            ));
        }
        if let Some(multiplier) = self.delay_multiplier {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(ConfigError::invalid(
                    PolicyKind::Retry,
                    &self.name,
                    format!("delay_multiplier must be finite and >= 1.0, got {}", multiplier),
                ));
            }
        }
        if let JitterStrategy::Proportional(factor) = self.jitter {
            if !(0.0..=1.0).contains(&factor) {
                return Err(ConfigError::invalid(
                    PolicyKind::Retry,
                    &self.name,
                    format!("jitter factor must be within [0, 1], got {}", factor),
                ));
            }
        }
        Ok(())
    }
}

impl JitterStrategy {
    /// Apply jitter to a base delay.
    ///
    /// # Arguments
    ///
    /// * `base_delay` - The calculated delay before jitter
    /// * `prev_delay` - The previous delay (for decorrelated jitter)
    /// * `max_delay` - Optional cap on the final delay
    pub fn apply(
        &self,
        base_delay: Duration,
        #[cfg_attr(not(feature = "jitter"), allow(unused_variables))] prev_delay: Option<Duration>,
        max_delay: Option<Duration>,
    ) -> Duration {
        let jittered = match self {
            JitterStrategy::None => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                let mut rng = rand::rng();
                let base_millis = base_delay.as_millis() as f64;
                let jitter_range = base_millis * factor;
                let min = (base_millis - jitter_range).max(0.0);
                let max = base_millis + jitter_range;
                let jittered_millis = rng.random_range(min..=max);
                Duration::from_millis(jittered_millis as u64)
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                let max_millis = base_delay.as_millis() as u64;
                if max_millis == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::rng().random_range(0..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Decorrelated => {
                use rand::Rng;
                let prev = prev_delay.unwrap_or(base_delay);
                let base_millis = base_delay.as_millis() as u64;
                let max_millis = prev.as_millis().saturating_mul(3) as u64;
                if max_millis <= base_millis {
                    base_delay
                } else {
                    Duration::from_millis(rand::rng().random_range(base_millis..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Decorrelated => base_delay,
        };

        match max_delay {
            Some(max) => jittered.min(max),
            None => jittered,
        }
    }
}
