//! Retry with exponential backoff.
//!
//! An operation is attempted `max_retries + 1` times; before retry `n + 1`
//! the caller sleeps `min(initial_delay * backoff_factor^n, max_delay)`.
//! Success at any attempt returns immediately. The final failure is
//! aggregated into [`RetryError::Exhausted`] carrying the last underlying
//! error.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{Classify, ErrorCode, ErrorSeverity};

/// Errors surfaced by [`retry_with_backoff`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed; `source` is the last underlying error.
    #[error("all {attempts} attempts exhausted, last error: {source}")]
    Exhausted { attempts: u32, source: E },

    /// The retry configuration is invalid.
    #[error("invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl<E: fmt::Debug + fmt::Display> Classify for RetryError<E> {
    fn code(&self) -> ErrorCode {
        match self {
            RetryError::Exhausted { .. } => ErrorCode::RetryExhausted,
            RetryError::InvalidConfiguration { .. } => ErrorCode::Validation,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

/// Backoff tuning knobs.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt, so `max_retries + 1` attempts total.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    pub fn validate<E>(&self) -> Result<(), RetryError<E>> {
        if self.backoff_factor < 1.0 {
            return Err(RetryError::InvalidConfiguration {
                message: "backoff_factor must be at least 1.0".to_string(),
            });
        }
        if self.initial_delay.is_zero() {
            return Err(RetryError::InvalidConfiguration {
                message: "initial_delay must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Delay before the retry following failed attempt `attempt` (0-based),
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt.min(63) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Builder for [`RetryConfig`].
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.backoff_factor = factor;
        self
    }

    pub fn build(self) -> RetryConfig {
        self.config
    }
}

/// Retry `operation` with exponential backoff and no retry observer.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug + fmt::Display,
{
    retry_with_backoff_observed(config, operation, |_, _: &E| {}).await
}

/// Retry `operation` with exponential backoff, invoking `on_retry(attempt,
/// error)` before each delay. `attempt` is 1-based: the number of the
/// retry about to be scheduled.
pub async fn retry_with_backoff_observed<F, Fut, T, E, O>(
    config: &RetryConfig,
    mut operation: F,
    mut on_retry: O,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug + fmt::Display,
    O: FnMut(u32, &E),
{
    config.validate()?;

    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt, "operation succeeded after retries");
                }
                return Ok(value);
            }
            Err(error) => {
                if attempt == config.max_retries {
                    warn!(attempts = attempt + 1, error = %error, "retry attempts exhausted");
                    return Err(RetryError::Exhausted { attempts: attempt + 1, source: error });
                }
                let delay = config.delay_for(attempt);
                debug!(attempt = attempt + 1, ?delay, error = %error, "retrying after backoff");
                on_retry(attempt + 1, &error);
                tokio::time::sleep(delay).await;
            }
        }
    }

    // The loop always returns from its final iteration.
    unreachable!("retry loop exited without a result")
}
