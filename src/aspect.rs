//! Guarded calls: timeout and retry applied around one call site.
//!
//! A [`GuardedCall`] is built once per call site from an [`Invocation`], the
//! tagged description of how the underlying work is called, and the executors
//! resolved for it. [`GuardedCall::invoke`] follows one code path per
//! [`CallShape`] and always layers retry over timeout, so every attempt gets
//! a fresh deadline.
//!
//! # Example
//!
//! ```rust
//! use resilient::aspect::{GuardedCall, Invocation, Invoked};
//! use resilient::{PolicyRegistry, RetryPolicy, TimeoutPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let registry = PolicyRegistry::builder()
//!     .timeout(TimeoutPolicy::new("fast", Duration::from_millis(50)).unwrap())
//!     .retry(RetryPolicy::new("thrice", 3))
//!     .build()
//!     .unwrap();
//!
//! let call = GuardedCall::from_registry(
//!     Invocation::future(|| async { Ok::<_, std::io::Error>("pong") }),
//!     &registry,
//!     Some("fast"),
//!     Some("thrice"),
//! )
//! .unwrap();
//!
//! match call.invoke() {
//!     Invoked::Pending(future) => assert_eq!(future.await.unwrap(), "pong"),
//!     _ => unreachable!(),
//! }
//! # });
//! ```

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};

use crate::error::ConfigError;
use crate::registry::PolicyRegistry;
use crate::retry::{Retrier, RetryError, RetryExhausted};
use crate::timeout::{TimeoutError, Timeouter};

/// How the guarded work is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// One-shot call that blocks the caller.
    Blocking,
    /// One-shot call returning a future.
    Async,
    /// Call returning a lazy stream of results.
    Stream,
}

type BlockingFn<T, E> = dyn Fn() -> Result<T, E> + Send + Sync;
type AsyncFn<T, E> = dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync;
type StreamFn<T, E> = dyn Fn() -> BoxStream<'static, Result<T, E>> + Send + Sync;

/// The work behind a call site, tagged with its shape.
///
/// Each variant holds something that can be invoked again for every attempt.
pub enum Invocation<T, E> {
    /// Blocking work.
    Blocking(Arc<BlockingFn<T, E>>),
    /// Factory of futures.
    Async(Arc<AsyncFn<T, E>>),
    /// Factory of streams.
    Stream(Arc<StreamFn<T, E>>),
}

impl<T, E> Invocation<T, E> {
    /// Wrap blocking work.
    pub fn blocking<F>(work: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(work))
    }

    /// Wrap a future factory.
    pub fn future<F, Fut>(make_work: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::Async(Arc::new(move || make_work().boxed()))
    }

    /// Wrap a stream factory.
    pub fn stream<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        Self::Stream(Arc::new(move || factory().boxed()))
    }

    /// The tag of this invocation.
    pub fn shape(&self) -> CallShape {
        match self {
            Self::Blocking(_) => CallShape::Blocking,
            Self::Async(_) => CallShape::Async,
            Self::Stream(_) => CallShape::Stream,
        }
    }
}

impl<T, E> Clone for Invocation<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Blocking(work) => Self::Blocking(Arc::clone(work)),
            Self::Async(make_work) => Self::Async(Arc::clone(make_work)),
            Self::Stream(factory) => Self::Stream(Arc::clone(factory)),
        }
    }
}

impl<T, E> fmt::Debug for Invocation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Invocation").field(&self.shape()).finish()
    }
}

/// Failure of a guarded call.
///
/// Exactly one of: the last attempt timed out with no retry configured, the
/// retry budget was spent, or the work failed with a failure that was not
/// retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResilienceError<E> {
    /// The deadline elapsed and no retry followed.
    Timeout {
        /// Name of the timeout policy.
        policy: String,
        /// The configured duration.
        duration: Duration,
    },
    /// Every retry attempt failed; each attempt records a timeout or a failure.
    Exhausted(RetryExhausted<TimeoutError<E>>),
    /// The work's own failure, unchanged.
    Failed(E),
}

impl<E> ResilienceError<E> {
    /// Returns true if a deadline elapsed and no retry followed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The exhaustion details, if the retry budget was spent.
    pub fn exhausted(&self) -> Option<&RetryExhausted<TimeoutError<E>>> {
        match self {
            Self::Exhausted(exhausted) => Some(exhausted),
            _ => None,
        }
    }

    /// The work's own failure, if that is what ended the call.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<TimeoutError<E>> for ResilienceError<E> {
    fn from(err: TimeoutError<E>) -> Self {
        match err {
            TimeoutError::Timeout { policy, duration } => Self::Timeout { policy, duration },
            TimeoutError::Inner(e) => Self::Failed(e),
        }
    }
}

impl<E> From<RetryError<TimeoutError<E>>> for ResilienceError<E> {
    fn from(err: RetryError<TimeoutError<E>>) -> Self {
        match err {
            RetryError::Exhausted(exhausted) => Self::Exhausted(exhausted),
            RetryError::NonRetryable(e) => e.into(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for ResilienceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { policy, duration } => write!(
                f,
                "timeout policy '{}' exceeded: no result within {:?}",
                policy, duration
            ),
            Self::Exhausted(exhausted) => write!(f, "{}", exhausted),
            Self::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl<E: Error + 'static> Error for ResilienceError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Timeout { .. } => None,
            Self::Exhausted(exhausted) => Some(exhausted),
            Self::Failed(e) => e.source(),
        }
    }
}

/// The result of [`GuardedCall::invoke`], one variant per call shape.
pub enum Invoked<T, E> {
    /// A blocking call has already completed.
    Ready(Result<T, ResilienceError<E>>),
    /// An async call, to be awaited.
    Pending(BoxFuture<'static, Result<T, ResilienceError<E>>>),
    /// A guarded stream.
    Stream(BoxStream<'static, Result<T, ResilienceError<E>>>),
}

impl<T: Send + 'static, E: Send + 'static> Invoked<T, E> {
    /// View any outcome as a stream; one-shot calls yield a single item.
    pub fn into_stream(self) -> BoxStream<'static, Result<T, ResilienceError<E>>> {
        match self {
            Self::Ready(result) => futures::stream::once(async move { result }).boxed(),
            Self::Pending(future) => future.into_stream().boxed(),
            Self::Stream(stream) => stream,
        }
    }
}

impl<T, E> fmt::Debug for Invoked<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Invoked::Ready"),
            Self::Pending(_) => f.write_str("Invoked::Pending"),
            Self::Stream(_) => f.write_str("Invoked::Stream"),
        }
    }
}

/// One call site wrapped in its timeout and retry executors.
pub struct GuardedCall<T, E> {
    invocation: Invocation<T, E>,
    timeouter: Option<Timeouter>,
    retrier: Option<Retrier>,
}

impl<T, E> GuardedCall<T, E>
where
    T: Send + 'static,
    E: Error + Send + 'static,
{
    /// Wrap `invocation` with no policies applied yet.
    pub fn new(invocation: Invocation<T, E>) -> Self {
        Self {
            invocation,
            timeouter: None,
            retrier: None,
        }
    }

    /// Wire a call site by policy names, failing if either name is unknown.
    pub fn from_registry(
        invocation: Invocation<T, E>,
        registry: &PolicyRegistry,
        timeout: Option<&str>,
        retry: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut call = Self::new(invocation);
        if let Some(name) = timeout {
            call = call.with_timeout(registry.timeouter(name)?.clone());
        }
        if let Some(name) = retry {
            call = call.with_retry(registry.retrier(name)?.clone());
        }
        Ok(call)
    }

    /// Bound every attempt with `timeouter`.
    pub fn with_timeout(mut self, timeouter: Timeouter) -> Self {
        self.timeouter = Some(timeouter);
        self
    }

    /// Retry failed attempts with `retrier`.
    pub fn with_retry(mut self, retrier: Retrier) -> Self {
        self.retrier = Some(retrier);
        self
    }

    /// The shape of the wrapped work.
    pub fn shape(&self) -> CallShape {
        self.invocation.shape()
    }

    /// Run the call.
    ///
    /// Blocking work runs to completion before this returns; async and stream
    /// work is returned unstarted.
    pub fn invoke(&self) -> Invoked<T, E> {
        match &self.invocation {
            Invocation::Blocking(work) => Invoked::Ready(self.invoke_blocking(Arc::clone(work))),
            Invocation::Async(make_work) => {
                Invoked::Pending(self.invoke_async(Arc::clone(make_work)))
            }
            Invocation::Stream(factory) => Invoked::Stream(self.invoke_stream(Arc::clone(factory))),
        }
    }

    fn invoke_blocking(&self, work: Arc<BlockingFn<T, E>>) -> Result<T, ResilienceError<E>> {
        let attempt = || match &self.timeouter {
            Some(timeouter) => {
                let work = Arc::clone(&work);
                timeouter.execute(move || work())
            }
            None => work().map_err(TimeoutError::Inner),
        };

        match &self.retrier {
            Some(retrier) => retrier.execute(attempt).map_err(ResilienceError::from),
            None => attempt().map_err(ResilienceError::from),
        }
    }

    fn invoke_async(
        &self,
        make_work: Arc<AsyncFn<T, E>>,
    ) -> BoxFuture<'static, Result<T, ResilienceError<E>>> {
        let timeouter = self.timeouter.clone();
        let retrier = self.retrier.clone();

        async move {
            let attempt = || {
                let work = make_work();
                let timeouter = timeouter.clone();
                async move {
                    match timeouter {
                        Some(timeouter) => timeouter.execute_async(work).await,
                        None => work.await.map_err(TimeoutError::Inner),
                    }
                }
            };

            match retrier {
                Some(retrier) => retrier
                    .execute_async(attempt)
                    .await
                    .map_err(ResilienceError::from),
                None => attempt().await.map_err(ResilienceError::from),
            }
        }
        .boxed()
    }

    fn invoke_stream(
        &self,
        factory: Arc<StreamFn<T, E>>,
    ) -> BoxStream<'static, Result<T, ResilienceError<E>>> {
        let timeouter = self.timeouter.clone();
        let attempt = move || -> BoxStream<'static, Result<T, TimeoutError<E>>> {
            let producer = factory();
            match &timeouter {
                Some(timeouter) => timeouter.wrap_stream(producer).boxed(),
                None => producer
                    .map(|item| item.map_err(TimeoutError::Inner))
                    .boxed(),
            }
        };

        match &self.retrier {
            Some(retrier) => retrier
                .wrap_stream(attempt)
                .map(|item| item.map_err(ResilienceError::from))
                .boxed(),
            None => attempt()
                .map(|item| item.map_err(ResilienceError::from))
                .boxed(),
        }
    }
}

impl<T, E> fmt::Debug for GuardedCall<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedCall")
            .field("shape", &self.invocation.shape())
            .field("timeout", &self.timeouter.as_ref().map(|t| t.policy().name()))
            .field("retry", &self.retrier.as_ref().map(|r| r.policy().name()))
            .finish()
    }
}
