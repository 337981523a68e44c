//! Configuration errors raised while wiring policies.
//!
//! Every error in this module surfaces at startup, when a registry is built or
//! a wrapper looks up its policy by name. Nothing here is produced while a
//! guarded call is running.

use std::fmt;

/// Which family of policy an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// A [`TimeoutPolicy`](crate::TimeoutPolicy).
    Timeout,
    /// A [`RetryPolicy`](crate::RetryPolicy).
    Retry,
    /// A [`FallbackPolicy`](crate::FallbackPolicy).
    Fallback,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Retry => f.write_str("retry"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Error raised when policies are declared, validated or looked up.
///
/// # Examples
///
/// ```rust
/// use resilient::{ConfigError, PolicyKind, PolicyRegistry};
///
/// let registry = PolicyRegistry::builder().build().unwrap();
///
/// match registry.timeouter("missing") {
///     Err(ConfigError::UnknownPolicy { kind, name }) => {
///         assert_eq!(kind, PolicyKind::Timeout);
///         assert_eq!(name, "missing");
///     }
///     _ => panic!("expected unknown policy"),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No policy with this name was registered.
    UnknownPolicy {
        /// Family that was searched.
        kind: PolicyKind,
        /// Requested name.
        name: String,
    },
    /// Two policies of the same family share a name.
    DuplicatePolicy {
        /// Family of the duplicated policy.
        kind: PolicyKind,
        /// Duplicated name.
        name: String,
    },
    /// A policy failed validation.
    InvalidPolicy {
        /// Family of the invalid policy.
        kind: PolicyKind,
        /// Name of the invalid policy.
        name: String,
        /// Human readable explanation.
        reason: String,
    },
    /// A policy references a failure predicate that was never registered.
    UnknownPredicate {
        /// Policy holding the reference.
        policy: String,
        /// Missing predicate name.
        predicate: String,
    },
    /// The process-wide registry was already installed.
    AlreadyInstalled,
}

impl ConfigError {
    pub(crate) fn invalid(kind: PolicyKind, name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            kind,
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown(kind: PolicyKind, name: &str) -> Self {
        Self::UnknownPolicy {
            kind,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPolicy { kind, name } => {
                write!(f, "no {} policy named '{}' is configured", kind, name)
            }
            Self::DuplicatePolicy { kind, name } => {
                write!(f, "{} policy '{}' is declared more than once", kind, name)
            }
            Self::InvalidPolicy { kind, name, reason } => {
                write!(f, "invalid {} policy '{}': {}", kind, name, reason)
            }
            Self::UnknownPredicate { policy, predicate } => write!(
                f,
                "policy '{}' references unknown failure predicate '{}'",
                policy, predicate
            ),
            Self::AlreadyInstalled => f.write_str("policy registry is already installed"),
        }
    }
}

impl std::error::Error for ConfigError {}
