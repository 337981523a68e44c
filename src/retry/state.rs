//! Per-invocation retry bookkeeping.

use std::error::Error;
use std::mem;
use std::time::Duration;

// The async shapes wait on tokio's clock, so attempts are timed on it too.
#[cfg(not(feature = "async"))]
use std::time::Instant;
#[cfg(feature = "async")]
use tokio::time::Instant;

use super::{Attempt, RetryError, RetryExhausted, RetryPolicy};

/// What the loop should do after a failed attempt.
#[derive(Debug)]
pub(crate) enum Decision<E> {
    /// Wait this long, then try again.
    Retry(Duration),
    /// Stop and surface this error.
    GiveUp(RetryError<E>),
}

/// Mutable state owned by exactly one retried call or stream subscription.
///
/// Created fresh for every invocation and dropped when it ends.
#[derive(Debug)]
pub(crate) struct RetryState<E> {
    attempts: Vec<Attempt<E>>,
    started: Instant,
    attempt_started: Instant,
    last_progress: Instant,
    delivered: usize,
    prev_delay: Option<Duration>,
}

impl<E> RetryState<E> {
    pub(crate) fn new() -> Self {
        let now = Instant::now();
        Self {
            attempts: Vec::new(),
            started: now,
            attempt_started: now,
            last_progress: now,
            delivered: 0,
            prev_delay: None,
        }
    }

    /// Mark the start of the next attempt.
    pub(crate) fn begin_attempt(&mut self) {
        self.attempt_started = Instant::now();
    }

    /// 1-based index of the attempt in flight.
    pub(crate) fn attempt(&self) -> u32 {
        self.attempts.len() as u32 + 1
    }

    /// Elements handed to the consumer so far, across all subscriptions.
    pub(crate) fn delivered(&self) -> usize {
        self.delivered
    }

    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    pub(crate) fn last_progress(&self) -> Instant {
        self.last_progress
    }

    /// A stream element reached the consumer.
    pub(crate) fn record_progress(&mut self) {
        self.delivered += 1;
        self.last_progress = Instant::now();
    }
}

impl<E: Error + 'static> RetryState<E> {
    /// Classify a failure and decide whether another attempt follows.
    pub(crate) fn on_failure(&mut self, policy: &RetryPolicy, error: E) -> Decision<E> {
        let attempt = self.attempt();

        if !policy.failure_predicate().test(&error) {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                policy = %policy.name(),
                attempt,
                error = %error,
                "failure is not retryable"
            );
            return Decision::GiveUp(RetryError::NonRetryable(error));
        }

        let next_delay = policy.delay_with_jitter(attempt, self.prev_delay);

        #[cfg(feature = "tracing")]
        match next_delay {
            Some(delay) => tracing::debug!(
                policy = %policy.name(),
                attempt,
                max_attempts = policy.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "attempt failed, retrying"
            ),
            None => tracing::warn!(
                policy = %policy.name(),
                attempts = attempt,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                error = %error,
                "retry attempts exhausted"
            ),
        }

        self.attempts
            .push(Attempt::new(attempt, error, self.attempt_started.elapsed()));

        match next_delay {
            Some(delay) => {
                self.prev_delay = Some(delay);
                Decision::Retry(delay)
            }
            None => Decision::GiveUp(RetryError::Exhausted(RetryExhausted::new(
                policy.name(),
                mem::take(&mut self.attempts),
                self.started.elapsed(),
            ))),
        }
    }
}
