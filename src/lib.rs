//! # Resilient
//!
//! Timeout, retry and fallback executors for guarded calls.
//!
//! Policies are declared once by name, collected in a [`PolicyRegistry`] and
//! resolved while call sites are wired. At run time each executor wraps one of
//! three call shapes: blocking work, futures, and streams.
//!
//! - [`Timeouter`] bounds a call, or the gap between stream elements, by a
//!   deadline and reports [`TimeoutError::Timeout`] when it elapses.
//! - [`Retrier`] re-runs failed work up to a bounded number of attempts and
//!   reports [`RetryExhausted`] with every recorded attempt when it gives up.
//! - [`Fallbacker`] switches to alternative work on accepted failures.
//!
//! When timeout and retry guard the same call, retry wraps timeout so each
//! attempt gets its own deadline; see [`aspect::GuardedCall`].
//!
//! ## Quick Example
//!
//! ```rust
//! use resilient::{RetryPolicy, Retrier, TimeoutPolicy, Timeouter};
//! use std::time::Duration;
//!
//! let timeouter = Timeouter::new(TimeoutPolicy::new("db", Duration::from_secs(1)).unwrap());
//! let retrier = Retrier::new(RetryPolicy::new("db", 3)).unwrap();
//!
//! let mut calls = 0;
//! let result = retrier.execute(|| {
//!     calls += 1;
//!     let attempt = calls;
//!     timeouter.execute(move || {
//!         if attempt < 3 {
//!             Err(std::io::Error::new(std::io::ErrorKind::Other, "busy"))
//!         } else {
//!             Ok(attempt)
//!         }
//!     })
//! });
//!
//! assert_eq!(result.unwrap(), 3);
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

#[cfg(feature = "async")]
pub mod aspect;
#[cfg(feature = "serde")]
pub mod config;
pub mod error;
pub mod fallback;
pub mod predicate;
pub mod registry;
pub mod retry;
pub mod testing;
pub mod timeout;

// Re-exports
pub use error::{ConfigError, PolicyKind};
pub use fallback::{FallbackPolicy, Fallbacker};
pub use predicate::FailurePredicate;
pub use registry::{PolicyRegistry, RegistryBuilder};
pub use retry::{Attempt, JitterStrategy, Retrier, RetryError, RetryExhausted, RetryPolicy};
pub use timeout::{TimeoutError, TimeoutPolicy, Timeouter};

#[cfg(feature = "async")]
pub use aspect::{CallShape, GuardedCall, Invocation, Invoked, ResilienceError};

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "async")]
    pub use crate::aspect::{GuardedCall, Invocation, Invoked, ResilienceError};
    pub use crate::error::ConfigError;
    pub use crate::fallback::{FallbackPolicy, Fallbacker};
    pub use crate::predicate::FailurePredicate;
    pub use crate::registry::PolicyRegistry;
    pub use crate::retry::{RetryError, RetryPolicy, Retrier};
    pub use crate::timeout::{TimeoutError, TimeoutPolicy, Timeouter};
}
