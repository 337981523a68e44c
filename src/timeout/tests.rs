//! Behaviour tests for the timeout executor.

use super::*;
use crate::testing::TestError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn timeouter(millis: u64) -> Timeouter {
    Timeouter::new(TimeoutPolicy::new("test", Duration::from_millis(millis)).unwrap())
}

#[test]
fn test_blocking_completes_within_deadline() {
    let result = timeouter(500).execute(|| Ok::<_, TestError>("done"));
    assert_eq!(result, Ok("done"));
}

#[test]
fn test_blocking_passes_inner_error_through() {
    let result = timeouter(500).execute(|| Err::<(), _>(TestError::permanent("bad input")));
    assert_eq!(
        result,
        Err(TimeoutError::Inner(TestError::permanent("bad input")))
    );
}

#[test]
fn test_blocking_times_out_after_deadline() {
    let start = Instant::now();
    let result = timeouter(50).execute(|| {
        std::thread::sleep(Duration::from_secs(2));
        Ok::<_, TestError>(())
    });

    let elapsed = start.elapsed();
    assert_eq!(
        result,
        Err(TimeoutError::timeout("test", Duration::from_millis(50)))
    );
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(2));
}

#[test]
#[should_panic(expected = "worker exploded")]
fn test_blocking_resumes_worker_panic() {
    let _ = timeouter(500).execute(|| -> Result<(), TestError> { panic!("worker exploded") });
}

#[cfg(feature = "async")]
mod async_shapes {
    use super::*;
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn test_async_completes_within_deadline() {
        let result = timeouter(100)
            .execute_async(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, TestError>(7)
            })
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_times_out_and_drops_future() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let start = tokio::time::Instant::now();
        let result = timeouter(100)
            .execute_async(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, TestError>(7)
            })
            .await;

        assert!(matches!(result, Err(TimeoutError::Timeout { .. })));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_inner_error_passes_through() {
        let result = timeouter(100)
            .execute_async(async { Err::<(), _>(TestError::transient("flaky")) })
            .await;
        assert_eq!(result, Err(TimeoutError::Inner(TestError::transient("flaky"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_aborts_losing_task() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result = timeouter(100)
            .execute_spawned(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, TestError>(())
            })
            .await;

        assert!(result.unwrap_err().is_timeout());
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_returns_fast_result() {
        let result = timeouter(100)
            .execute_spawned(async { Ok::<_, TestError>("fast") })
            .await;
        assert_eq!(result, Ok("fast"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_with_short_gaps_runs_past_total_duration() {
        // 20 elements, 40ms apart: 800ms total against a 100ms gap budget.
        let producer = futures::stream::iter(0..20).then(|n| async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok::<_, TestError>(n)
        });

        let items: Vec<_> = timeouter(100).wrap_stream(producer).collect().await;
        assert_eq!(items.len(), 20);
        assert!(items.iter().all(Result::is_ok));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_terminates_at_long_gap() {
        let producer = futures::stream::iter(0..5).then(|n| async move {
            let gap = if n == 3 { 500 } else { 10 };
            tokio::time::sleep(Duration::from_millis(gap)).await;
            Ok::<_, TestError>(n)
        });

        let items: Vec<_> = timeouter(100).wrap_stream(producer).collect().await;

        assert_eq!(items.len(), 4);
        assert_eq!(items[0], Ok(0));
        assert_eq!(items[2], Ok(2));
        assert!(matches!(&items[3], Err(TimeoutError::Timeout { policy, .. }) if policy == "test"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_slow_first_element_times_out() {
        let producer = futures::stream::once(async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok::<_, TestError>(1)
        });

        let items: Vec<_> = timeouter(100).wrap_stream(producer).collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_clock_starts_on_first_poll() {
        let producer = futures::stream::iter(vec![Ok::<_, TestError>(1), Ok(2)]);
        let wrapped = timeouter(100).wrap_stream(producer);

        // Idle time before subscription is not counted.
        tokio::time::sleep(Duration::from_secs(5)).await;

        let items: Vec<_> = wrapped.collect().await;
        assert_eq!(items, vec![Ok(1), Ok(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_slow_consumer_counts_against_gap() {
        let producer = futures::stream::iter(vec![Ok::<_, TestError>(1), Ok(2)]);
        let mut wrapped = Box::pin(timeouter(100).wrap_stream(producer));

        assert_eq!(wrapped.next().await, Some(Ok(1)));
        tokio::time::sleep(Duration::from_millis(250)).await;

        let next = wrapped.next().await;
        assert!(matches!(next, Some(Err(TimeoutError::Timeout { .. }))));
        assert_eq!(wrapped.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_inner_errors_pass_through() {
        let producer = futures::stream::iter(vec![
            Ok(1),
            Err(TestError::transient("hiccup")),
            Ok(3),
        ]);

        let items: Vec<_> = timeouter(100).wrap_stream(producer).collect().await;
        assert_eq!(
            items,
            vec![
                Ok(1),
                Err(TimeoutError::Inner(TestError::transient("hiccup"))),
                Ok(3)
            ]
        );
    }
}
