//! Integration tests for the resilience module.
//!
//! Exercises circuit breaker state transitions and retry backoff against
//! scripted failure sequences.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use civiport_common::{
    retry_with_backoff, BreakerConfig, BreakerError, CircuitBreaker, CircuitState, MockClock,
    RetryConfig, RetryError,
};

#[derive(Debug, Clone)]
struct TestError {
    message: String,
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TestError {}

fn down() -> TestError {
    TestError { message: "service unavailable".to_string() }
}

fn breaker(threshold: u32, reset: Duration) -> (CircuitBreaker<MockClock>, MockClock) {
    let clock = MockClock::new();
    let config = BreakerConfig::builder()
        .failure_threshold(threshold)
        .call_timeout(Duration::from_secs(60))
        .reset_timeout(reset)
        .build()
        .expect("valid breaker config");
    let breaker = CircuitBreaker::with_clock(config, clock.clone()).expect("valid breaker config");
    (breaker, clock)
}

/// Validates the breaker opens once the failure threshold is reached and
/// then rejects calls without invoking the wrapped operation.
///
/// Assertions:
/// - Confirms the breaker stays closed below the threshold
/// - Confirms the state is Open after the threshold-th failure
/// - Confirms a rejected call does not run the operation
#[tokio::test(flavor = "multi_thread")]
async fn breaker_opens_and_fails_fast() {
    let (breaker, _clock) = breaker(3, Duration::from_secs(30));
    let invocations = Arc::new(AtomicU32::new(0));

    for _ in 0..3 {
        let invocations = Arc::clone(&invocations);
        let result: Result<(), _> = breaker
            .execute(move || async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err(down())
            })
            .await;
        assert!(result.is_err());
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let invocations_clone = Arc::clone(&invocations);
    let result: Result<(), _> = breaker
        .execute(move || async move {
            invocations_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<(), TestError>(())
        })
        .await;

    assert!(matches!(result, Err(BreakerError::Open { .. })));
    assert_eq!(invocations.load(Ordering::SeqCst), 3);
}

/// Validates the half-open trial path: after the reset timeout one call is
/// admitted, and its success closes the breaker again.
#[tokio::test(flavor = "multi_thread")]
async fn breaker_recovers_through_half_open_trial() {
    let (breaker, clock) = breaker(2, Duration::from_secs(30));

    for _ in 0..2 {
        let _: Result<(), _> = breaker.execute(|| async { Err(down()) }).await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    clock.advance(Duration::from_secs(31));

    let result: Result<&str, _> = breaker.execute(|| async { Ok::<_, TestError>("recovered") }).await;
    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().failure_count, 0);
}

/// Validates that retry and breaker compose: retries exhaust against a dead
/// service, the breaker accumulates those failures and ends up open.
#[tokio::test(flavor = "multi_thread")]
async fn retry_exhaustion_feeds_breaker_failures() {
    let (breaker, _clock) = breaker(3, Duration::from_secs(30));
    let breaker = Arc::new(breaker);
    let config =
        RetryConfig::builder().max_retries(2).initial_delay(Duration::from_millis(1)).build();

    let breaker_clone = Arc::clone(&breaker);
    let result = retry_with_backoff(&config, move || {
        let breaker = Arc::clone(&breaker_clone);
        async move { breaker.execute(|| async { Err::<(), _>(down()) }).await }
    })
    .await;

    match result {
        Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(breaker.state(), CircuitState::Open);
}

/// Validates the fallback variant only substitutes the fallback value while
/// the breaker is open; a plain operation failure still surfaces.
#[tokio::test(flavor = "multi_thread")]
async fn fallback_substitutes_only_when_open() {
    let (breaker, _clock) = breaker(1, Duration::from_secs(30));

    let result: Result<&str, _> =
        breaker.execute_with_fallback(|| async { Err(down()) }, || "fallback").await;
    assert!(result.is_err());
    assert_eq!(breaker.state(), CircuitState::Open);

    let result: Result<&str, _> =
        breaker.execute_with_fallback(|| async { Ok::<_, TestError>("live") }, || "fallback").await;
    assert_eq!(result.unwrap(), "fallback");
}
