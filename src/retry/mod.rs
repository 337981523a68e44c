//! Bounded-retry execution.
//!
//! A [`Retrier`] re-invokes a unit of work while it fails with a retryable
//! failure, waiting between attempts as its [`RetryPolicy`] prescribes, and
//! gives up with a [`RetryExhausted`] listing every attempt once the budget is
//! spent.
//!
//! - **Pure core**: [`RetryPolicy`] is just data and easily testable
//! - **Fresh state per call**: attempt counters live inside one invocation
//! - **Every shape**: blocking, async and stream calls follow the same algorithm
//!
//! # Quick Start
//!
//! ```rust
//! use resilient::{RetryPolicy, Retrier};
//! use std::cell::Cell;
//! use std::io;
//!
//! let retrier = Retrier::new(RetryPolicy::new("inventory", 5)).unwrap();
//! let calls = Cell::new(0);
//!
//! let result = retrier.execute(|| {
//!     calls.set(calls.get() + 1);
//!     if calls.get() < 3 {
//!         Err(io::Error::new(io::ErrorKind::TimedOut, "busy"))
//!     } else {
//!         Ok("in stock")
//!     }
//! });
//!
//! assert_eq!(result.unwrap(), "in stock");
//! assert_eq!(calls.get(), 3);
//! ```
//!
//! # Classification
//!
//! By default every failure is retryable. A [`FailurePredicate`](crate::FailurePredicate)
//! set with [`RetryPolicy::retry_if`] narrows that; rejected failures come back
//! immediately as [`RetryError::NonRetryable`].
//!
//! # Jitter Support
//!
//! Jitter adds randomness to delays to prevent thundering herd problems.
//! Enable the `jitter` feature to use jitter.

mod error;
mod executor;
mod policy;
mod state;

pub use error::{Attempt, RetryError, RetryExhausted};
pub use executor::Retrier;
pub use policy::{JitterStrategy, RetryPolicy};

#[cfg(test)]
mod tests;
