//! The retry loop for each call shape.

use std::error::Error;
use std::sync::Arc;
use std::thread;

#[cfg(feature = "async")]
use std::future::Future;
#[cfg(feature = "async")]
use std::pin::Pin;

#[cfg(feature = "async")]
use futures::{Stream, StreamExt};

use super::state::{Decision, RetryState};
use super::{RetryError, RetryPolicy};
use crate::error::ConfigError;

/// Executes work under a [`RetryPolicy`].
///
/// Attempts of one call run strictly one after another. Cloning is cheap and
/// clones share the immutable policy; no state is carried between calls.
#[derive(Debug, Clone)]
pub struct Retrier {
    policy: Arc<RetryPolicy>,
}

impl Retrier {
    /// Create an executor for `policy`, validating it first.
    pub fn new(policy: RetryPolicy) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            policy: Arc::new(policy),
        })
    }

    /// The policy this executor applies.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Retry blocking work, sleeping the calling thread between attempts.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use resilient::{RetryError, RetryPolicy, Retrier};
    /// use std::io;
    ///
    /// let retrier = Retrier::new(RetryPolicy::new("once", 1)).unwrap();
    /// let result = retrier.execute(|| Err::<(), _>(io::Error::new(io::ErrorKind::Other, "no")));
    /// assert!(matches!(result, Err(RetryError::Exhausted(_))));
    /// ```
    pub fn execute<T, E, F>(&self, mut work: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: Error + 'static,
    {
        let mut state = RetryState::new();
        loop {
            state.begin_attempt();
            match work() {
                Ok(value) => return Ok(value),
                Err(error) => match state.on_failure(&self.policy, error) {
                    Decision::Retry(delay) => {
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                    }
                    Decision::GiveUp(err) => return Err(err),
                },
            }
        }
    }

    /// Retry async work, suspending between attempts.
    ///
    /// `make_work` is called once per attempt to build a fresh future.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use resilient::{RetryPolicy, Retrier};
    /// use std::sync::atomic::{AtomicU32, Ordering};
    ///
    /// # tokio_test::block_on(async {
    /// let retrier = Retrier::new(RetryPolicy::new("async", 3)).unwrap();
    /// let calls = AtomicU32::new(0);
    ///
    /// let result = retrier
    ///     .execute_async(|| async {
    ///         match calls.fetch_add(1, Ordering::SeqCst) {
    ///             0 => Err(std::fmt::Error),
    ///             _ => Ok("second time lucky"),
    ///         }
    ///     })
    ///     .await;
    ///
    /// assert_eq!(result.unwrap(), "second time lucky");
    /// # });
    /// ```
    #[cfg(feature = "async")]
    pub async fn execute_async<T, E, F, Fut>(&self, mut make_work: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        let mut state = RetryState::new();
        loop {
            state.begin_attempt();
            match make_work().await {
                Ok(value) => return Ok(value),
                Err(error) => match state.on_failure(&self.policy, error) {
                    Decision::Retry(delay) => tokio::time::sleep(delay).await,
                    Decision::GiveUp(err) => return Err(err),
                },
            }
        }
    }

    /// Retry a stream by re-subscribing to a fresh producer.
    ///
    /// `factory` builds a new producer for every attempt. The first failed
    /// element ends the current subscription; if the failure is retryable and
    /// attempts remain, a new producer is created after the policy delay. The
    /// attempt counter is shared by all subscriptions of the returned stream.
    ///
    /// Producers are assumed idempotent: a new subscription replays the
    /// sequence from the start, and the elements the consumer already received
    /// are skipped so none is delivered twice.
    ///
    /// On exhaustion, or on a non-retryable failure, the stream yields one
    /// error and ends.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use futures::StreamExt;
    /// use resilient::{RetryPolicy, Retrier};
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::sync::Arc;
    ///
    /// # tokio_test::block_on(async {
    /// let retrier = Retrier::new(RetryPolicy::new("feed", 3)).unwrap();
    /// let subscriptions = Arc::new(AtomicU32::new(0));
    ///
    /// let counter = subscriptions.clone();
    /// let stream = retrier.wrap_stream(move || {
    ///     let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
    ///     let items = if first {
    ///         vec![Ok(1), Err(std::fmt::Error)]
    ///     } else {
    ///         vec![Ok(1), Ok(2)]
    ///     };
    ///     futures::stream::iter(items)
    /// });
    ///
    /// let items: Vec<_> = stream.collect().await;
    /// assert_eq!(items, vec![Ok(1), Ok(2)]);
    /// assert_eq!(subscriptions.load(Ordering::SeqCst), 2);
    /// # });
    /// ```
    #[cfg(feature = "async")]
    pub fn wrap_stream<T, E, F, S>(
        &self,
        factory: F,
    ) -> impl Stream<Item = Result<T, RetryError<E>>> + Send + 'static
    where
        F: Fn() -> S + Send + 'static,
        S: Stream<Item = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Error + Send + 'static,
    {
        let subscription = Subscription {
            retrier: self.clone(),
            factory,
            producer: None,
            skip: 0,
            state: RetryState::new(),
            finished: false,
        };

        futures::stream::unfold(subscription, |mut sub| async move {
            loop {
                if sub.finished {
                    return None;
                }

                let factory = &sub.factory;
                let state = &mut sub.state;
                let skip = &mut sub.skip;
                let producer = sub.producer.get_or_insert_with(|| {
                    state.begin_attempt();
                    *skip = state.delivered();
                    #[cfg(feature = "tracing")]
                    if state.attempt() > 1 {
                        tracing::debug!(
                            attempt = state.attempt(),
                            idle_ms = state.last_progress().elapsed().as_millis() as u64,
                            skip = *skip,
                            "re-subscribing to stream producer"
                        );
                    }
                    Box::pin(factory())
                });

                let next = producer.next().await;
                match next {
                    Some(Ok(item)) => {
                        if sub.skip > 0 {
                            sub.skip -= 1;
                            continue;
                        }
                        sub.state.record_progress();
                        return Some((Ok(item), sub));
                    }
                    Some(Err(error)) => {
                        sub.producer = None;
                        match sub.state.on_failure(&sub.retrier.policy, error) {
                            Decision::Retry(delay) => tokio::time::sleep(delay).await,
                            Decision::GiveUp(err) => {
                                sub.finished = true;
                                return Some((Err(err), sub));
                            }
                        }
                    }
                    None => return None,
                }
            }
        })
    }
}

/// One subscription to a retried stream.
#[cfg(feature = "async")]
struct Subscription<F, S, E> {
    retrier: Retrier,
    factory: F,
    producer: Option<Pin<Box<S>>>,
    skip: usize,
    state: RetryState<E>,
    finished: bool,
}
