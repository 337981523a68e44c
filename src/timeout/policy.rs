//! Timeout policy configuration.

use std::time::Duration;

use crate::error::{ConfigError, PolicyKind};

/// A named deadline applied to guarded calls.
///
/// Policies are plain data and immutable once built, so any number of callers
/// may read the same policy concurrently.
///
/// # Examples
///
/// ```rust
/// use resilient::TimeoutPolicy;
/// use std::time::Duration;
///
/// let policy = TimeoutPolicy::new("db", Duration::from_secs(2)).unwrap();
/// assert_eq!(policy.name(), "db");
/// assert_eq!(policy.duration(), Duration::from_secs(2));
///
/// assert!(TimeoutPolicy::new("db", Duration::ZERO).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutPolicy {
    name: String,
    duration: Duration,
}

impl TimeoutPolicy {
    /// Create a policy. The duration must be non-zero.
    pub fn new(name: impl Into<String>, duration: Duration) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::invalid(
                PolicyKind::Timeout,
                &name,
                "name must not be empty",
            ));
        }
        if duration.is_zero() {
            return Err(ConfigError::invalid(
                PolicyKind::Timeout,
                &name,
                "duration must be greater than zero",
            ));
        }
        Ok(Self { name, duration })
    }

    /// The lookup key of this policy.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured deadline.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}
