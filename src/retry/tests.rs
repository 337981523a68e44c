//! Integration tests for retry functionality.

use super::*;
use crate::testing::{transient_only, FlakyWork, TestError};
use std::time::{Duration, Instant};

fn retrier(max_attempts: u32) -> Retrier {
    Retrier::new(RetryPolicy::new("test", max_attempts)).unwrap()
}

#[test]
fn test_rejects_invalid_policy_at_construction() {
    assert!(Retrier::new(RetryPolicy::new("broken", 0)).is_err());
}

#[test]
fn test_success_on_first_attempt_invokes_once() {
    let work = FlakyWork::failing_times(0, "1");
    let result = retrier(5).execute(|| work.call());

    assert_eq!(result, Ok("1"));
    assert_eq!(work.calls(), 1);
}

#[test]
fn test_fails_four_times_then_succeeds() {
    let work = FlakyWork::failing_times(4, "1");
    let result = retrier(5).execute(|| work.call());

    assert_eq!(result, Ok("1"));
    assert_eq!(work.calls(), 5);
}

#[test]
fn test_fails_every_attempt_exhausts_budget() {
    let work = FlakyWork::failing_times(5, "1");
    let result = retrier(5).execute(|| work.call());

    assert_eq!(work.calls(), 5);
    let exhausted = match result {
        Err(RetryError::Exhausted(exhausted)) => exhausted,
        other => panic!("expected exhaustion, got {:?}", other),
    };
    assert_eq!(exhausted.attempts().len(), 5);
    assert_eq!(exhausted.policy(), "test");
    assert!(!exhausted.to_string().is_empty());
}

#[test]
fn test_non_retryable_surfaces_after_first_attempt() {
    let work = FlakyWork::failing_permanently(3);
    let policy = RetryPolicy::new("picky", 5).retry_if(transient_only());
    let result = Retrier::new(policy).unwrap().execute(|| work.call());

    assert_eq!(
        result,
        Err(RetryError::NonRetryable(TestError::permanent("failure 1")))
    );
    assert_eq!(work.calls(), 1);
}

#[test]
fn test_invalid_jitter_rejected_before_any_call() {
    let policy = RetryPolicy::new("jittery", 3)
        .with_delay(Duration::from_millis(10))
        .with_jitter(f64::NAN);
    assert!(matches!(
        Retrier::new(policy),
        Err(crate::ConfigError::InvalidPolicy { .. })
    ));
}

#[test]
fn test_blocking_waits_between_attempts() {
    let work = FlakyWork::failing_times(2, ());
    let policy = RetryPolicy::new("delayed", 3).with_delay(Duration::from_millis(20));

    let start = Instant::now();
    let result = Retrier::new(policy).unwrap().execute(|| work.call());

    assert!(result.is_ok());
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[test]
fn test_independent_calls_do_not_share_attempts() {
    let retrier = retrier(2);

    let first = FlakyWork::failing_times(1, 1);
    let second = FlakyWork::failing_times(1, 2);

    assert_eq!(retrier.execute(|| first.call()), Ok(1));
    assert_eq!(retrier.execute(|| second.call()), Ok(2));
}

#[cfg(feature = "async")]
#[tokio::test(start_paused = true)]
async fn test_async_fails_four_times_then_succeeds() {
    let work = FlakyWork::failing_times(4, "1");
    let result = retrier(5).execute_async(|| work.call_async()).await;

    assert_eq!(result, Ok("1"));
    assert_eq!(work.calls(), 5);
}

#[cfg(feature = "async")]
#[tokio::test(start_paused = true)]
async fn test_async_exhaustion_records_every_attempt() {
    let work = FlakyWork::failing_times(5, "1");
    let result = retrier(5).execute_async(|| work.call_async()).await;

    let exhausted = result.unwrap_err();
    assert_eq!(exhausted.exhausted().map(|e| e.attempts().len()), Some(5));
    let messages: Vec<String> = exhausted
        .exhausted()
        .into_iter()
        .flat_map(|e| e.attempts().iter().map(|a| a.error.to_string()))
        .collect();
    assert_eq!(messages[0], "transient failure: failure 1");
    assert_eq!(messages[4], "transient failure: failure 5");
}

#[cfg(feature = "async")]
#[tokio::test(start_paused = true)]
async fn test_async_backoff_delays_accumulate() {
    let work = FlakyWork::failing_times(3, ());
    let policy = RetryPolicy::new("backoff", 4)
        .with_delay(Duration::from_millis(100))
        .with_delay_multiplier(2.0);

    let start = tokio::time::Instant::now();
    let result = Retrier::new(policy)
        .unwrap()
        .execute_async(|| work.call_async())
        .await;

    assert!(result.is_ok());
    // 100 + 200 + 400
    assert!(start.elapsed() >= Duration::from_millis(700));
    assert!(start.elapsed() < Duration::from_millis(800));
}

#[cfg(feature = "async")]
#[tokio::test(start_paused = true)]
async fn test_async_exhaustion_reports_virtual_elapsed_time() {
    let work = FlakyWork::failing_times(3, ()).with_latency(Duration::from_millis(500));
    let policy = RetryPolicy::new("timed", 3).with_delay(Duration::from_secs(1));

    let result = Retrier::new(policy)
        .unwrap()
        .execute_async(|| work.call_async())
        .await;

    let err = result.unwrap_err();
    let exhausted = err.exhausted().unwrap();
    // 3 x 500ms attempts plus 2 x 1s delays
    assert!(exhausted.total_duration() >= Duration::from_millis(3_500));
    assert!(exhausted
        .attempts()
        .iter()
        .all(|a| a.elapsed >= Duration::from_millis(500)));
}

#[cfg(feature = "async")]
#[tokio::test(start_paused = true)]
async fn test_async_non_retryable_at_later_attempt() {
    let work = FlakyWork::scripted(vec![
        Err(TestError::transient("first")),
        Err(TestError::permanent("second")),
        Ok(()),
    ]);
    let policy = RetryPolicy::new("picky", 5).retry_if(transient_only());

    let result = Retrier::new(policy)
        .unwrap()
        .execute_async(|| work.call_async())
        .await;

    assert_eq!(
        result,
        Err(RetryError::NonRetryable(TestError::permanent("second")))
    );
    assert_eq!(work.calls(), 2);
}

#[cfg(feature = "async")]
mod streams {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Producer that emits `0..len` and fails after `fail_after` elements on
    /// its first `failing` subscriptions.
    fn producer(
        subscriptions: Arc<AtomicU32>,
        failing: u32,
        fail_after: usize,
        len: u32,
    ) -> impl Fn() -> futures::stream::Iter<std::vec::IntoIter<Result<u32, TestError>>> {
        move || {
            let n = subscriptions.fetch_add(1, Ordering::SeqCst);
            let mut items: Vec<Result<u32, TestError>> = (0..len).map(Ok).collect();
            if n < failing {
                items.truncate(fail_after);
                items.push(Err(TestError::transient(format!("subscription {}", n + 1))));
            }
            futures::stream::iter(items)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_resubscribes_without_redelivering() {
        let subscriptions = Arc::new(AtomicU32::new(0));
        let stream = retrier(3).wrap_stream(producer(subscriptions.clone(), 2, 2, 5));

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items, vec![Ok(0), Ok(1), Ok(2), Ok(3), Ok(4)]);
        assert_eq!(subscriptions.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_exhaustion_terminates_with_error() {
        let subscriptions = Arc::new(AtomicU32::new(0));
        let stream = retrier(5).wrap_stream(producer(subscriptions.clone(), u32::MAX, 1, 3));

        let items: Vec<_> = stream.collect().await;
        assert_eq!(subscriptions.load(Ordering::SeqCst), 5);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok(0));
        match &items[1] {
            Err(RetryError::Exhausted(exhausted)) => {
                assert_eq!(exhausted.attempts().len(), 5);
                assert_eq!(
                    exhausted.last_error(),
                    &TestError::transient("subscription 5")
                );
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_first_element_after_retry() {
        let subscriptions = Arc::new(AtomicU32::new(0));
        let mut stream = Box::pin(retrier(5).wrap_stream(producer(subscriptions.clone(), 1, 0, 1)));

        assert_eq!(stream.next().await, Some(Ok(0)));
        assert_eq!(subscriptions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_non_retryable_stops_immediately() {
        let policy = RetryPolicy::new("picky", 5).retry_if(transient_only());
        let stream = Retrier::new(policy).unwrap().wrap_stream(|| {
            futures::stream::iter(vec![Ok(1), Err(TestError::permanent("corrupt"))])
        });

        let items: Vec<_> = stream.collect().await;
        assert_eq!(
            items,
            vec![
                Ok(1),
                Err(RetryError::NonRetryable(TestError::permanent("corrupt")))
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_waits_policy_delay_before_resubscribing() {
        let subscriptions = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new("slow", 3).with_delay(Duration::from_millis(250));
        let stream = Retrier::new(policy)
            .unwrap()
            .wrap_stream(producer(subscriptions.clone(), 2, 0, 1));

        let start = tokio::time::Instant::now();
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items, vec![Ok(0)]);
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(start.elapsed() < Duration::from_millis(750));
    }
}

#[cfg(feature = "tracing")]
mod logging {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_exhaustion_is_logged() {
        let work = FlakyWork::failing_times(2, ());
        let _ = retrier(2).execute(|| work.call());

        assert!(logs_contain("attempt failed, retrying"));
        assert!(logs_contain("retry attempts exhausted"));
    }
}
