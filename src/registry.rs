//! Named policy registry.
//!
//! Wrappers resolve their executors by policy name once, while they are being
//! wired. A [`PolicyRegistry`] is immutable after [`RegistryBuilder::build`],
//! so lookups need no locking and any number of threads may share it.
//!
//! # Example
//!
//! ```rust
//! use resilient::{PolicyRegistry, RetryPolicy, TimeoutPolicy};
//! use std::time::Duration;
//!
//! let registry = PolicyRegistry::builder()
//!     .timeout(TimeoutPolicy::new("db", Duration::from_secs(2)).unwrap())
//!     .retry(RetryPolicy::new("db", 3).with_delay(Duration::from_millis(50)))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(registry.timeouter("db").unwrap().duration(), Duration::from_secs(2));
//! assert_eq!(registry.retry_policy("db").unwrap().max_attempts(), 3);
//! assert!(registry.retrier("payments").is_err());
//! ```

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{ConfigError, PolicyKind};
use crate::fallback::{FallbackPolicy, Fallbacker};
use crate::predicate::FailurePredicate;
use crate::retry::{Retrier, RetryPolicy};
use crate::timeout::{TimeoutPolicy, Timeouter};

#[cfg(feature = "serde")]
use crate::config::ResilienceConfig;

static GLOBAL: OnceLock<PolicyRegistry> = OnceLock::new();

/// Immutable map from policy names to ready executors.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    timeouts: HashMap<String, Timeouter>,
    retries: HashMap<String, Retrier>,
    fallbacks: HashMap<String, Fallbacker>,
}

impl PolicyRegistry {
    /// Start declaring policies.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The timeout executor named `name`.
    pub fn timeouter(&self, name: &str) -> Result<&Timeouter, ConfigError> {
        self.timeouts
            .get(name)
            .ok_or_else(|| ConfigError::unknown(PolicyKind::Timeout, name))
    }

    /// The timeout policy named `name`.
    pub fn timeout_policy(&self, name: &str) -> Result<&TimeoutPolicy, ConfigError> {
        self.timeouter(name).map(Timeouter::policy)
    }

    /// The retry executor named `name`.
    pub fn retrier(&self, name: &str) -> Result<&Retrier, ConfigError> {
        self.retries
            .get(name)
            .ok_or_else(|| ConfigError::unknown(PolicyKind::Retry, name))
    }

    /// The retry policy named `name`.
    pub fn retry_policy(&self, name: &str) -> Result<&RetryPolicy, ConfigError> {
        self.retrier(name).map(Retrier::policy)
    }

    /// The fallback executor named `name`.
    pub fn fallbacker(&self, name: &str) -> Result<&Fallbacker, ConfigError> {
        self.fallbacks
            .get(name)
            .ok_or_else(|| ConfigError::unknown(PolicyKind::Fallback, name))
    }

    /// Names of all policies of `kind`, sorted.
    pub fn names(&self, kind: PolicyKind) -> Vec<&str> {
        let mut names: Vec<&str> = match kind {
            PolicyKind::Timeout => self.timeouts.keys().map(String::as_str).collect(),
            PolicyKind::Retry => self.retries.keys().map(String::as_str).collect(),
            PolicyKind::Fallback => self.fallbacks.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }

    /// Make this registry the process-wide one.
    ///
    /// Installation happens once; later calls fail with
    /// [`ConfigError::AlreadyInstalled`] and leave the first registry in place.
    pub fn install(self) -> Result<&'static PolicyRegistry, ConfigError> {
        let mut candidate = Some(self);
        let installed = GLOBAL.get_or_init(|| candidate.take().unwrap_or_default());
        match candidate {
            None => {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    timeouts = installed.timeouts.len(),
                    retries = installed.retries.len(),
                    fallbacks = installed.fallbacks.len(),
                    "policy registry installed"
                );
                Ok(installed)
            }
            Some(_) => Err(ConfigError::AlreadyInstalled),
        }
    }

    /// The process-wide registry, if one was installed.
    pub fn global() -> Option<&'static PolicyRegistry> {
        GLOBAL.get()
    }
}

/// Collects policy declarations and validates them as a whole.
///
/// Nothing is checked until [`build`](RegistryBuilder::build), so declarations
/// may arrive in any order.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    timeouts: Vec<TimeoutPolicy>,
    retries: Vec<RetryPolicy>,
    fallbacks: Vec<FallbackPolicy>,
    predicates: HashMap<String, FailurePredicate>,
    #[cfg(feature = "serde")]
    configs: Vec<ResilienceConfig>,
}

impl RegistryBuilder {
    /// Declare a timeout policy.
    pub fn timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.timeouts.push(policy);
        self
    }

    /// Declare a retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retries.push(policy);
        self
    }

    /// Declare a fallback policy.
    pub fn fallback(mut self, policy: FallbackPolicy) -> Self {
        self.fallbacks.push(policy);
        self
    }

    /// Register a failure predicate that configuration can refer to by name.
    pub fn predicate(mut self, name: impl Into<String>, predicate: FailurePredicate) -> Self {
        self.predicates.insert(name.into(), predicate);
        self
    }

    /// Declare every policy in `config`.
    #[cfg(feature = "serde")]
    pub fn with_config(mut self, config: ResilienceConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Validate every declaration and build the registry.
    pub fn build(self) -> Result<PolicyRegistry, ConfigError> {
        #[allow(unused_mut)]
        let RegistryBuilder {
            mut timeouts,
            mut retries,
            mut fallbacks,
            predicates,
            #[cfg(feature = "serde")]
            configs,
        } = self;

        #[cfg(feature = "serde")]
        for config in configs {
            let (t, r, f) = config.into_policies(&predicates)?;
            timeouts.extend(t);
            retries.extend(r);
            fallbacks.extend(f);
        }
        #[cfg(not(feature = "serde"))]
        let _ = predicates;

        let mut registry = PolicyRegistry::default();

        for policy in timeouts {
            let name = policy.name().to_string();
            insert_unique(
                &mut registry.timeouts,
                PolicyKind::Timeout,
                name,
                Timeouter::new(policy),
            )?;
        }
        for policy in retries {
            let name = policy.name().to_string();
            insert_unique(
                &mut registry.retries,
                PolicyKind::Retry,
                name,
                Retrier::new(policy)?,
            )?;
        }
        for policy in fallbacks {
            let name = policy.name().to_string();
            insert_unique(
                &mut registry.fallbacks,
                PolicyKind::Fallback,
                name,
                Fallbacker::new(policy)?,
            )?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            timeouts = ?registry.names(PolicyKind::Timeout),
            retries = ?registry.names(PolicyKind::Retry),
            fallbacks = ?registry.names(PolicyKind::Fallback),
            "policy registry built"
        );

        Ok(registry)
    }
}

fn insert_unique<V>(
    map: &mut HashMap<String, V>,
    kind: PolicyKind,
    name: String,
    value: V,
) -> Result<(), ConfigError> {
    if map.contains_key(&name) {
        return Err(ConfigError::DuplicatePolicy { kind, name });
    }
    map.insert(name, value);
    Ok(())
}
