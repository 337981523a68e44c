//! Deadline enforcement for each call shape.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[cfg(feature = "async")]
use std::future::Future;
#[cfg(feature = "async")]
use std::pin::Pin;

#[cfg(feature = "async")]
use futures::{Stream, StreamExt};

use super::{TimeoutError, TimeoutPolicy};

/// Executes work under a [`TimeoutPolicy`].
///
/// Cloning is cheap and every clone shares the same immutable policy. A
/// `Timeouter` holds no per-call state: each call owns its own deadline.
#[derive(Debug, Clone)]
pub struct Timeouter {
    policy: Arc<TimeoutPolicy>,
}

impl Timeouter {
    /// Create an executor for `policy`.
    pub fn new(policy: TimeoutPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    /// The policy this executor enforces.
    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    /// Shorthand for `self.policy().duration()`.
    pub fn duration(&self) -> Duration {
        self.policy.duration()
    }

    fn timed_out<E>(&self) -> TimeoutError<E> {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            policy = %self.policy.name(),
            duration_ms = self.policy.duration().as_millis() as u64,
            "timeout exceeded"
        );
        TimeoutError::timeout(self.policy.name(), self.policy.duration())
    }

    /// Run blocking work with a deadline.
    ///
    /// The work runs on a dedicated worker thread while the caller waits for
    /// at most the policy duration. On timeout the worker is abandoned: it is
    /// not interrupted, and whatever it eventually returns is discarded.
    ///
    /// A panic inside the work is resumed on the calling thread.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use resilient::{TimeoutPolicy, Timeouter};
    /// use std::time::Duration;
    ///
    /// let timeouter = Timeouter::new(TimeoutPolicy::new("io", Duration::from_secs(1)).unwrap());
    /// let result = timeouter.execute(|| "42".parse::<u32>());
    /// assert_eq!(result.unwrap(), 42);
    /// ```
    pub fn execute<T, E, F>(&self, work: F) -> Result<T, TimeoutError<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let worker = thread::spawn(move || {
            // The receiver is gone once the caller stopped waiting.
            let _ = tx.send(work());
        });

        match rx.recv_timeout(self.policy.duration()) {
            Ok(result) => result.map_err(TimeoutError::Inner),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(self.timed_out()),
            Err(mpsc::RecvTimeoutError::Disconnected) => match worker.join() {
                Err(panic) => std::panic::resume_unwind(panic),
                Ok(()) => Err(self.timed_out()),
            },
        }
    }

    /// Race a future against the deadline.
    ///
    /// The future is polled in place. On timeout it is dropped, which is the
    /// cooperative cancellation signal for async work: it stops at its current
    /// suspension point and never delivers a result.
    #[cfg(feature = "async")]
    pub async fn execute_async<T, E, Fut>(&self, work: Fut) -> Result<T, TimeoutError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.policy.duration(), work).await {
            Ok(result) => result.map_err(TimeoutError::Inner),
            Err(_) => Err(self.timed_out()),
        }
    }

    /// Run a future as an independent task and race it against a timer.
    ///
    /// Whichever finishes first decides the outcome. When the timer wins the
    /// task is aborted. A task cancelled by runtime shutdown is reported as a
    /// timeout; a panicking task is resumed on the caller.
    #[cfg(feature = "async")]
    pub async fn execute_spawned<T, E, Fut>(&self, work: Fut) -> Result<T, TimeoutError<E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let mut task = tokio::spawn(work);

        tokio::select! {
            joined = &mut task => match joined {
                Ok(result) => result.map_err(TimeoutError::Inner),
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => Err(self.timed_out()),
            },
            _ = tokio::time::sleep(self.policy.duration()) => {
                task.abort();
                Err(self.timed_out())
            }
        }
    }

    /// Bound the gap between successive elements of a stream.
    ///
    /// The clock starts when the returned stream is first polled and restarts
    /// after every successful element. Failed elements pass through as
    /// [`TimeoutError::Inner`] and leave the clock running. If the next
    /// successful element does not arrive in time, the stream yields a single
    /// [`TimeoutError::Timeout`], drops the producer and ends.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use futures::StreamExt;
    /// use resilient::{TimeoutPolicy, Timeouter};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let timeouter = Timeouter::new(TimeoutPolicy::new("feed", Duration::from_secs(1)).unwrap());
    /// let items = futures::stream::iter(vec![Ok::<_, std::io::Error>(1), Ok(2), Ok(3)]);
    ///
    /// let collected: Vec<_> = timeouter.wrap_stream(items).collect().await;
    /// assert_eq!(collected.len(), 3);
    /// # });
    /// ```
    #[cfg(feature = "async")]
    pub fn wrap_stream<S, T, E>(
        &self,
        stream: S,
    ) -> impl Stream<Item = Result<T, TimeoutError<E>>> + Send + 'static
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let state = GapState {
            timeouter: self.clone(),
            producer: Some(Box::pin(stream)),
            last_emission: None,
        };

        futures::stream::unfold(state, |mut state| async move {
            let producer = state.producer.as_mut()?;
            let last = *state
                .last_emission
                .get_or_insert_with(tokio::time::Instant::now);
            let deadline = last + state.timeouter.duration();

            let next = if tokio::time::Instant::now() > deadline {
                Err(())
            } else {
                tokio::time::timeout_at(deadline, producer.next())
                    .await
                    .map_err(|_| ())
            };

            match next {
                Ok(Some(Ok(item))) => {
                    state.last_emission = Some(tokio::time::Instant::now());
                    Some((Ok(item), state))
                }
                Ok(Some(Err(e))) => Some((Err(TimeoutError::Inner(e)), state)),
                Ok(None) => None,
                Err(()) => {
                    state.producer = None;
                    let err = state.timeouter.timed_out();
                    Some((Err(err), state))
                }
            }
        })
    }
}

/// Per-subscription clock for [`Timeouter::wrap_stream`].
#[cfg(feature = "async")]
struct GapState<S> {
    timeouter: Timeouter,
    producer: Option<Pin<Box<S>>>,
    last_emission: Option<tokio::time::Instant>,
}
