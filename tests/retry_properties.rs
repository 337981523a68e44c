//! Property-based tests for retry budgets, delays and timeouts

use proptest::prelude::*;
use resilient::testing::FlakyWork;
use resilient::{RetryError, RetryPolicy, Retrier, TimeoutError, TimeoutPolicy, Timeouter};
use std::time::Duration;

proptest! {
    #[test]
    fn prop_work_runs_at_most_max_attempts(max in 1u32..10, failures in 0u32..15) {
        let work = FlakyWork::failing_times(failures, ());
        let result = Retrier::new(RetryPolicy::new("p", max)).unwrap().execute(|| work.call());

        prop_assert_eq!(work.calls(), (failures + 1).min(max));
        prop_assert_eq!(result.is_ok(), failures < max);
    }

    #[test]
    fn prop_exhaustion_records_one_attempt_per_call(max in 1u32..10) {
        let work = FlakyWork::failing_times(u32::MAX, ());
        let result = Retrier::new(RetryPolicy::new("p", max)).unwrap().execute(|| work.call());

        match result {
            Err(RetryError::Exhausted(exhausted)) => {
                prop_assert_eq!(exhausted.attempts().len() as u32, max);
                let indices: Vec<u32> = exhausted.attempts().iter().map(|a| a.index).collect();
                prop_assert_eq!(indices, (1..=max).collect::<Vec<_>>());
            }
            other => prop_assert!(false, "expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn prop_no_delay_after_last_attempt(max in 1u32..20, delay_ms in 0u64..1_000) {
        let policy = RetryPolicy::new("p", max).with_delay(Duration::from_millis(delay_ms));

        prop_assert_eq!(policy.delay_for_attempt(max), None);
        prop_assert_eq!(policy.delay_for_attempt(0), None);
        for attempt in 1..max {
            prop_assert_eq!(policy.delay_for_attempt(attempt), Some(Duration::from_millis(delay_ms)));
        }
    }

    #[test]
    fn prop_backoff_is_monotonic_and_capped(
        max in 2u32..30,
        delay_ms in 1u64..500,
        multiplier in 1.0f64..4.0,
        cap_ms in 1u64..10_000,
    ) {
        let cap = Duration::from_millis(cap_ms);
        let policy = RetryPolicy::new("p", max)
            .with_delay(Duration::from_millis(delay_ms))
            .with_delay_multiplier(multiplier)
            .with_max_delay(cap);

        let delays: Vec<Duration> = (1..max).filter_map(|a| policy.delay_for_attempt(a)).collect();
        prop_assert_eq!(delays.len() as u32, max - 1);
        // allow for float rounding in the exponent
        let slack = Duration::from_micros(1);
        prop_assert!(delays.windows(2).all(|w| w[0] <= w[1] + slack));
        prop_assert!(delays.iter().all(|d| *d <= cap));
    }

    #[test]
    fn prop_fast_work_never_times_out(value in any::<u32>(), secs in 1u64..60) {
        let timeouter = Timeouter::new(TimeoutPolicy::new("t", Duration::from_secs(secs)).unwrap());
        let result = timeouter.execute(move || Ok::<_, std::fmt::Error>(value));
        prop_assert_eq!(result, Ok(value));
    }

    #[test]
    fn prop_timeout_message_names_policy(name in "[a-z]{1,12}", millis in 1u64..100_000) {
        let err: TimeoutError<std::fmt::Error> =
            TimeoutError::timeout(name.as_str(), Duration::from_millis(millis));
        let message = err.to_string();
        let quoted = format!("'{}'", name);
        prop_assert!(message.contains(&quoted));
        prop_assert!(err.is_timeout());
    }
}
