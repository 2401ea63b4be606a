//! Circuit breaker guarding an unreliable remote dependency.
//!
//! State machine:
//!
//! - `Closed`: calls proceed; consecutive failures are counted, and
//!   reaching `failure_threshold` opens the circuit.
//! - `Open`: calls are rejected without touching the dependency until
//!   `reset_timeout` has elapsed since the last failure, at which point the
//!   next call transitions to `HalfOpen` and is let through as a trial.
//! - `HalfOpen`: exactly one trial call is in flight. Success closes the
//!   circuit and resets the failure count; failure reopens it.
//!
//! Every admitted call is raced against `call_timeout`; a timeout counts
//! as a failure.

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::error::{Classify, ErrorCode, ErrorSeverity};
use crate::time::{Clock, SystemClock};

/// Errors surfaced by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the dependency was not invoked.
    #[error("circuit open, call rejected (retry in {retry_after:?})")]
    Open { retry_after: Duration },

    /// The call exceeded the configured call timeout.
    #[error("call timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The underlying operation failed.
    #[error("operation failed: {source}")]
    Operation { source: E },
}

impl<E: fmt::Debug + fmt::Display> Classify for BreakerError<E> {
    fn code(&self) -> ErrorCode {
        match self {
            BreakerError::Open { .. } => ErrorCode::CircuitOpen,
            BreakerError::Timeout { .. } => ErrorCode::Timeout,
            BreakerError::Operation { .. } => ErrorCode::RemoteRejected,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            BreakerError::Open { .. } | BreakerError::Timeout { .. } => ErrorSeverity::Warning,
            BreakerError::Operation { .. } => ErrorSeverity::Error,
        }
    }

    fn is_recoverable(&self) -> bool {
        true
    }
}

/// Configuration error for breaker construction.
#[derive(Debug, Error)]
#[error("invalid breaker configuration: {message}")]
pub struct InvalidBreakerConfig {
    message: String,
}

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Breaker tuning knobs.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures required to open the circuit.
    pub failure_threshold: u32,
    /// Deadline raced against every admitted call.
    pub call_timeout: Duration,
    /// Time the circuit stays open before admitting a trial call.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            call_timeout: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), InvalidBreakerConfig> {
        if self.failure_threshold == 0 {
            return Err(InvalidBreakerConfig {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }
        if self.call_timeout.is_zero() {
            return Err(InvalidBreakerConfig {
                message: "call_timeout must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`BreakerConfig`].
#[derive(Debug, Default)]
pub struct BreakerConfigBuilder {
    config: BreakerConfig,
}

impl BreakerConfigBuilder {
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.config.reset_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<BreakerConfig, InvalidBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Snapshot of breaker state for diagnostics.
#[derive(Debug, Clone)]
pub struct BreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u32,
    pub total_calls: u64,
    pub rejected_calls: u64,
    pub last_failure_at: Option<Instant>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    /// Set while a half-open trial call is in flight.
    trial_in_flight: bool,
    total_calls: u64,
    rejected_calls: u64,
}

/// Stateful guard around calls to one unreliable dependency.
///
/// Each instance owns its own state; do not share one breaker across
/// unrelated dependencies. Generic over [`Clock`] so the open-to-half-open
/// transition is testable without sleeping.
#[derive(Debug)]
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
    clock: C,
}

impl CircuitBreaker<SystemClock> {
    pub fn new(config: BreakerConfig) -> Result<Self, InvalidBreakerConfig> {
        Self::with_clock(config, SystemClock)
    }

    pub fn with_defaults() -> Self {
        Self { config: BreakerConfig::default(), inner: Mutex::new(BreakerInner::new()), clock: SystemClock }
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            trial_in_flight: false,
            total_calls: 0,
            rejected_calls: 0,
        }
    }
}

enum Admission {
    Admitted,
    Rejected { retry_after: Duration },
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker with a custom clock (used by tests).
    pub fn with_clock(config: BreakerConfig, clock: C) -> Result<Self, InvalidBreakerConfig> {
        config.validate()?;
        Ok(Self { config, inner: Mutex::new(BreakerInner::new()), clock })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("circuit breaker state lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Decide whether a call may proceed, transitioning Open -> HalfOpen
    /// when the reset timeout has elapsed.
    fn admit(&self) -> Admission {
        let mut inner = self.lock();
        inner.total_calls += 1;

        match inner.state {
            CircuitState::Closed => Admission::Admitted,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| self.clock.now().saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);
                if elapsed > self.config.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!("circuit half-open, admitting trial call");
                    Admission::Admitted
                } else {
                    inner.rejected_calls += 1;
                    Admission::Rejected {
                        retry_after: self.config.reset_timeout.saturating_sub(elapsed),
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    inner.rejected_calls += 1;
                    Admission::Rejected { retry_after: self.config.reset_timeout }
                } else {
                    inner.trial_in_flight = true;
                    Admission::Admitted
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            info!("trial call succeeded, closing circuit");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.trial_in_flight = false;
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        let now = self.clock.now();
        inner.last_failure_at = Some(now);

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    warn!(failures = inner.failure_count, "circuit opened");
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.trial_in_flight = false;
                warn!("trial call failed, circuit reopened");
            }
            CircuitState::Open => {}
        }
    }

    /// Execute `operation` under breaker protection.
    ///
    /// Rejected calls return [`BreakerError::Open`] without invoking the
    /// operation. Admitted calls are raced against
    /// [`BreakerConfig::call_timeout`].
    #[instrument(skip(self, operation), fields(state = %self.state()))]
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        match self.admit() {
            Admission::Rejected { retry_after } => {
                debug!("circuit breaker rejecting call");
                Err(BreakerError::Open { retry_after })
            }
            Admission::Admitted => {
                match tokio::time::timeout(self.config.call_timeout, operation()).await {
                    Ok(Ok(value)) => {
                        self.record_success();
                        Ok(value)
                    }
                    Ok(Err(source)) => {
                        self.record_failure();
                        Err(BreakerError::Operation { source })
                    }
                    Err(_) => {
                        self.record_failure();
                        Err(BreakerError::Timeout { timeout: self.config.call_timeout })
                    }
                }
            }
        }
    }

    /// Like [`execute`](Self::execute), but an open circuit yields the
    /// caller-supplied fallback value instead of an error.
    pub async fn execute_with_fallback<F, Fut, T, E, FB>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        FB: FnOnce() -> T,
    {
        match self.execute(operation).await {
            Err(BreakerError::Open { .. }) => {
                debug!("circuit open, serving fallback");
                Ok(fallback())
            }
            other => other,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn metrics(&self) -> BreakerMetrics {
        let inner = self.lock();
        BreakerMetrics {
            state: inner.state,
            failure_count: inner.failure_count,
            total_calls: inner.total_calls,
            rejected_calls: inner.rejected_calls,
            last_failure_at: inner.last_failure_at,
        }
    }

    /// Force the breaker back to `Closed` with counters cleared.
    pub fn reset(&self) {
        let mut inner = self.lock();
        *inner = BreakerInner::new();
        info!("circuit breaker manually reset");
    }
}
