//! Fallback execution.
//!
//! A [`Fallbacker`] runs a unit of work and, when it fails with a failure its
//! [`FallbackPolicy`] accepts, runs an alternative instead. Failures the policy
//! does not accept are returned unchanged.
//!
//! ```rust
//! use resilient::{FallbackPolicy, Fallbacker};
//! use std::io;
//!
//! let fallbacker = Fallbacker::new(FallbackPolicy::new("prices")).unwrap();
//!
//! let price = fallbacker.execute(
//!     || Err(io::Error::new(io::ErrorKind::ConnectionRefused, "pricing down")),
//!     || Ok(9.99),
//! );
//! assert_eq!(price.unwrap(), 9.99);
//! ```

use std::error::Error;
use std::sync::Arc;

#[cfg(feature = "async")]
use std::future::Future;
#[cfg(feature = "async")]
use std::pin::Pin;

#[cfg(feature = "async")]
use futures::{Stream, StreamExt};

use crate::error::{ConfigError, PolicyKind};
use crate::predicate::FailurePredicate;

/// A named rule deciding which failures switch to the fallback.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    name: String,
    failure_predicate: FailurePredicate,
}

impl FallbackPolicy {
    /// Create a policy that falls back on every failure.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_predicate: FailurePredicate::always(),
        }
    }

    /// Only fall back on failures accepted by `predicate`.
    pub fn fallback_if(mut self, predicate: FailurePredicate) -> Self {
        self.failure_predicate = predicate;
        self
    }

    /// The lookup key of this policy.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The classifier deciding which failures trigger the fallback.
    pub fn failure_predicate(&self) -> &FailurePredicate {
        &self.failure_predicate
    }

    /// Check the invariants an executor relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::invalid(
                PolicyKind::Fallback,
                &self.name,
                "name must not be empty",
            ));
        }
        Ok(())
    }
}

/// Executes work under a [`FallbackPolicy`].
#[derive(Debug, Clone)]
pub struct Fallbacker {
    policy: Arc<FallbackPolicy>,
}

impl Fallbacker {
    /// Create an executor for `policy`, validating it first.
    pub fn new(policy: FallbackPolicy) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            policy: Arc::new(policy),
        })
    }

    /// The policy this executor applies.
    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    fn should_fall_back(&self, error: &(dyn Error + 'static)) -> bool {
        let accepted = self.policy.failure_predicate().test(error);
        #[cfg(feature = "tracing")]
        if accepted {
            tracing::debug!(policy = %self.policy.name(), error = %error, "falling back");
        }
        accepted
    }

    /// Run blocking work, switching to `fallback` on an accepted failure.
    pub fn execute<T, E, F, G>(&self, work: F, fallback: G) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        G: FnOnce() -> Result<T, E>,
        E: Error + 'static,
    {
        match work() {
            Err(error) if self.should_fall_back(&error) => fallback(),
            other => other,
        }
    }

    /// Await `work`, awaiting `fallback()` instead on an accepted failure.
    #[cfg(feature = "async")]
    pub async fn execute_async<T, E, Fut, G, GFut>(&self, work: Fut, fallback: G) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        match work.await {
            Err(error) if self.should_fall_back(&error) => fallback().await,
            other => other,
        }
    }

    /// Continue a stream with a fallback stream after an accepted failure.
    ///
    /// Elements already delivered by `stream` stay delivered. The first
    /// failure ends `stream`: if the policy accepts it, the rest of the output
    /// comes from `fallback()`; otherwise the failure is yielded as the last
    /// element.
    ///
    /// ```rust
    /// use futures::StreamExt;
    /// use resilient::{FallbackPolicy, Fallbacker};
    ///
    /// # tokio_test::block_on(async {
    /// let fallbacker = Fallbacker::new(FallbackPolicy::new("feed")).unwrap();
    /// let primary = futures::stream::iter(vec![Ok(1), Err(std::fmt::Error), Ok(99)]);
    ///
    /// let items: Vec<_> = fallbacker
    ///     .wrap_stream(primary, || futures::stream::iter(vec![Ok(2), Ok(3)]))
    ///     .collect()
    ///     .await;
    /// assert_eq!(items, vec![Ok(1), Ok(2), Ok(3)]);
    /// # });
    /// ```
    #[cfg(feature = "async")]
    pub fn wrap_stream<T, E, S, G, FS>(
        &self,
        stream: S,
        fallback: G,
    ) -> impl Stream<Item = Result<T, E>> + Send + 'static
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        G: FnOnce() -> FS + Send + 'static,
        FS: Stream<Item = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Error + Send + 'static,
    {
        let state: FallbackStream<S, G, FS> = FallbackStream::Primary {
            fallbacker: self.clone(),
            producer: Box::pin(stream),
            fallback,
        };

        futures::stream::unfold(state, |state| async move {
            match state {
                FallbackStream::Primary {
                    fallbacker,
                    mut producer,
                    fallback,
                } => {
                    let next = producer.next().await;
                    match next {
                        Some(Err(error)) if fallbacker.should_fall_back(&error) => {
                            drop(producer);
                            let mut alternative = Box::pin(fallback());
                            let item = alternative.next().await?;
                            Some((item, FallbackStream::Fallback(alternative)))
                        }
                        Some(Err(error)) => Some((Err(error), FallbackStream::Done)),
                        Some(Ok(item)) => Some((
                            Ok(item),
                            FallbackStream::Primary {
                                fallbacker,
                                producer,
                                fallback,
                            },
                        )),
                        None => None,
                    }
                }
                FallbackStream::Fallback(mut alternative) => {
                    let item = alternative.next().await?;
                    Some((item, FallbackStream::Fallback(alternative)))
                }
                FallbackStream::Done => None,
            }
        })
    }
}

#[cfg(feature = "async")]
enum FallbackStream<S, G, FS> {
    Primary {
        fallbacker: Fallbacker,
        producer: Pin<Box<S>>,
        fallback: G,
    },
    Fallback(Pin<Box<FS>>),
    Done,
}
