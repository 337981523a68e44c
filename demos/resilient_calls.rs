//! Resilient Calls Example
//!
//! Walks through the executors on a simulated flaky inventory service:
//! - Retrying blocking work with exponential backoff
//! - Bounding async work with a deadline
//! - Retry over timeout on one guarded call
//! - Re-subscribing to a stream that stalls
//! - Falling back to cached data

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use resilient::prelude::*;
use resilient::testing::{transient_only, FlakyWork, TestError};

fn registry() -> Result<PolicyRegistry, ConfigError> {
    PolicyRegistry::builder()
        .timeout(TimeoutPolicy::new("inventory", Duration::from_millis(200))?)
        .retry(
            RetryPolicy::new("inventory", 4)
                .with_delay(Duration::from_millis(50))
                .with_delay_multiplier(2.0),
        )
        .fallback(FallbackPolicy::new("inventory").fallback_if(transient_only()))
        .build()
}

// ==================== Blocking Retry ====================

fn example_blocking_retry(registry: &PolicyRegistry) -> Result<(), ConfigError> {
    println!("\n=== Example 1: Blocking Retry ===");

    let work = FlakyWork::failing_times(2, 42u32);
    let result = registry.retrier("inventory")?.execute(|| {
        let outcome = work.call();
        println!("  attempt {}: {:?}", work.calls(), outcome);
        outcome
    });

    match result {
        Ok(stock) => println!("stock level {} after {} calls", stock, work.calls()),
        Err(err) => println!("gave up: {}", err),
    }
    Ok(())
}

// ==================== Async Timeout ====================

async fn example_async_timeout(registry: &PolicyRegistry) -> Result<(), ConfigError> {
    println!("\n=== Example 2: Async Timeout ===");

    let slow = FlakyWork::failing_times(0, 7u32).with_latency(Duration::from_secs(1));
    match registry
        .timeouter("inventory")?
        .execute_async(slow.call_async())
        .await
    {
        Ok(value) => println!("unexpected value {}", value),
        Err(err) => println!("{}", err),
    }
    Ok(())
}

// ==================== Retry Over Timeout ====================

async fn example_guarded_call(registry: &PolicyRegistry) -> Result<(), ConfigError> {
    println!("\n=== Example 3: Retry Over Timeout ===");

    // The first two calls hang; the third answers quickly.
    let work = Arc::new(FlakyWork::failing_times(0, "in stock"));
    let hangs = Arc::new(AtomicU32::new(2));
    let call = GuardedCall::from_registry(
        Invocation::future({
            let work = Arc::clone(&work);
            move || {
                let work = Arc::clone(&work);
                let hangs = Arc::clone(&hangs);
                async move {
                    if hangs.load(Ordering::SeqCst) > 0 {
                        hangs.fetch_sub(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    work.call_async().await
                }
            }
        }),
        registry,
        Some("inventory"),
        Some("inventory"),
    )?;

    if let Invoked::Pending(future) = call.invoke() {
        match future.await {
            Ok(answer) => println!("answer: {}", answer),
            Err(err) => println!("failed: {}", err),
        }
    }
    Ok(())
}

// ==================== Stream Retry ====================

async fn example_stream(registry: &PolicyRegistry) -> Result<(), ConfigError> {
    println!("\n=== Example 4: Stream Re-subscription ===");

    let subscriptions = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&subscriptions);
    let call = GuardedCall::from_registry(
        Invocation::stream(move || {
            let subscription = counter.fetch_add(1, Ordering::SeqCst);
            println!("  subscribing ({})", subscription + 1);
            futures::stream::iter(1..=5u32).then(move |sku| async move {
                let gap = if subscription == 0 && sku == 3 { 1_000 } else { 20 };
                tokio::time::sleep(Duration::from_millis(gap)).await;
                Ok::<_, TestError>(sku)
            })
        }),
        registry,
        Some("inventory"),
        Some("inventory"),
    )?;

    let mut updates = call.invoke().into_stream();
    while let Some(update) = updates.next().await {
        match update {
            Ok(sku) => println!("  sku {}", sku),
            Err(err) => println!("  stream failed: {}", err),
        }
    }
    println!(
        "stream finished after {} subscriptions",
        subscriptions.load(Ordering::SeqCst)
    );
    Ok(())
}

// ==================== Fallback ====================

fn example_fallback(registry: &PolicyRegistry) -> Result<(), ConfigError> {
    println!("\n=== Example 5: Fallback ===");

    let fallbacker = registry.fallbacker("inventory")?;
    let live = FlakyWork::failing_times(u32::MAX, 0u32);

    let stock = fallbacker.execute(|| live.call(), || Ok::<_, TestError>(10));
    println!("transient outage, cached stock: {:?}", stock);

    let rejected = fallbacker.execute(
        || Err::<u32, _>(TestError::permanent("unknown sku")),
        || Ok(10),
    );
    println!("permanent failure passes through: {:?}", rejected);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt().with_target(false).init();

    println!("Resilient Calls Examples");
    println!("========================");

    let registry = registry()?;

    example_blocking_retry(&registry)?;
    example_async_timeout(&registry).await?;
    example_guarded_call(&registry).await?;
    example_stream(&registry).await?;
    example_fallback(&registry)?;

    println!("\n=== All examples completed ===");
    Ok(())
}
