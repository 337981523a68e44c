//! Declarative policy configuration.
//!
//! Policies can be described as data, grouped by family and keyed by name,
//! and handed to [`RegistryBuilder::with_config`](crate::RegistryBuilder::with_config).
//! Durations are integer milliseconds. Failure predicates are referenced by
//! the name they were registered under on the builder.
//!
//! ```rust
//! use resilient::config::ResilienceConfig;
//! use resilient::{FailurePredicate, PolicyRegistry};
//!
//! let config: ResilienceConfig = serde_json::from_str(r#"{
//!     "timeout": { "db": { "duration_ms": 1500 } },
//!     "retry": {
//!         "db": {
//!             "attempts": 3,
//!             "delay_ms": 100,
//!             "delay_multiplier": 2.0,
//!             "failure_predicate": "io"
//!         }
//!     }
//! }"#).unwrap();
//!
//! let registry = PolicyRegistry::builder()
//!     .predicate("io", FailurePredicate::caused_by::<std::io::Error>())
//!     .with_config(config)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(registry.retry_policy("db").unwrap().max_attempts(), 3);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fallback::FallbackPolicy;
use crate::predicate::FailurePredicate;
use crate::retry::RetryPolicy;
use crate::timeout::TimeoutPolicy;

/// Every named policy, grouped by family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResilienceConfig {
    /// Timeout policies by name.
    pub timeout: BTreeMap<String, TimeoutConfig>,
    /// Retry policies by name.
    pub retry: BTreeMap<String, RetryConfig>,
    /// Fallback policies by name.
    pub fallback: BTreeMap<String, FallbackConfig>,
}

/// A timeout policy definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Deadline in milliseconds.
    pub duration_ms: u64,
}

/// A retry policy definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub attempts: u32,
    /// Base delay between attempts in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
    /// Growth factor applied to the delay after every failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_multiplier: Option<f64>,
    /// Upper bound for any single delay, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    /// Name of a registered failure predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_predicate: Option<String>,
}

/// A fallback policy definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackConfig {
    /// Name of a registered failure predicate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_predicate: Option<String>,
}

type Policies = (Vec<TimeoutPolicy>, Vec<RetryPolicy>, Vec<FallbackPolicy>);

impl ResilienceConfig {
    pub(crate) fn into_policies(
        self,
        predicates: &HashMap<String, FailurePredicate>,
    ) -> Result<Policies, ConfigError> {
        let timeouts = self
            .timeout
            .into_iter()
            .map(|(name, def)| TimeoutPolicy::new(name, Duration::from_millis(def.duration_ms)))
            .collect::<Result<Vec<_>, _>>()?;

        let retries = self
            .retry
            .into_iter()
            .map(|(name, def)| def.into_policy(name, predicates))
            .collect::<Result<Vec<_>, _>>()?;

        let fallbacks = self
            .fallback
            .into_iter()
            .map(|(name, def)| {
                let mut policy = FallbackPolicy::new(name.as_str());
                if let Some(predicate) = def.failure_predicate {
                    policy = policy.fallback_if(resolve(predicates, &name, &predicate)?);
                }
                Ok(policy)
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok((timeouts, retries, fallbacks))
    }
}

impl RetryConfig {
    fn into_policy(
        self,
        name: String,
        predicates: &HashMap<String, FailurePredicate>,
    ) -> Result<RetryPolicy, ConfigError> {
        let mut policy = RetryPolicy::new(name.as_str(), self.attempts)
            .with_delay(Duration::from_millis(self.delay_ms));
        if let Some(multiplier) = self.delay_multiplier {
            policy = policy.with_delay_multiplier(multiplier);
        }
        if let Some(max) = self.max_delay_ms {
            policy = policy.with_max_delay(Duration::from_millis(max));
        }
        if let Some(predicate) = self.failure_predicate {
            policy = policy.retry_if(resolve(predicates, &name, &predicate)?);
        }
        policy.validate()?;
        Ok(policy)
    }
}

fn resolve(
    predicates: &HashMap<String, FailurePredicate>,
    policy: &str,
    predicate: &str,
) -> Result<FailurePredicate, ConfigError> {
    predicates
        .get(predicate)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownPredicate {
            policy: policy.to_string(),
            predicate: predicate.to_string(),
        })
}

impl From<&TimeoutPolicy> for TimeoutConfig {
    fn from(policy: &TimeoutPolicy) -> Self {
        Self {
            duration_ms: u64::try_from(policy.duration().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
