//! Bounded-duration execution.
//!
//! A [`Timeouter`] enforces one [`TimeoutPolicy`] around a unit of work. The
//! same policy applies to every call shape:
//!
//! - **Blocking**: [`Timeouter::execute`] runs the work on a worker thread and
//!   stops waiting once the deadline passes.
//! - **Async**: [`Timeouter::execute_async`] races the future against the
//!   deadline and drops it on timeout.
//! - **Concurrent**: [`Timeouter::execute_spawned`] runs the future as its own
//!   task and aborts it on timeout.
//! - **Stream**: [`Timeouter::wrap_stream`] bounds the gap between successive
//!   elements, not the total lifetime of the stream.
//!
//! # Quick Start
//!
//! ```rust
//! use resilient::{TimeoutError, TimeoutPolicy, Timeouter};
//! use std::time::Duration;
//!
//! let policy = TimeoutPolicy::new("lookup", Duration::from_millis(50)).unwrap();
//! let timeouter = Timeouter::new(policy);
//!
//! let fast = timeouter.execute(|| Ok::<_, std::io::Error>(42));
//! assert_eq!(fast.unwrap(), 42);
//!
//! let slow = timeouter.execute(|| {
//!     std::thread::sleep(Duration::from_millis(500));
//!     Ok::<_, std::io::Error>(0)
//! });
//! assert!(matches!(slow, Err(TimeoutError::Timeout { .. })));
//! ```
//!
//! The executor never retries. Compose with [`Retrier`](crate::Retrier) one
//! layer up to give every attempt a fresh deadline.

mod error;
mod executor;
mod policy;

pub use error::TimeoutError;
pub use executor::Timeouter;
pub use policy::TimeoutPolicy;

#[cfg(test)]
mod tests;
