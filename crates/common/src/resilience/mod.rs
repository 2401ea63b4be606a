//! Resilience patterns protecting calls to the remote portal API.
//!
//! Two general-purpose wrappers usable around any remote call:
//!
//! - [`CircuitBreaker`]: short-circuits calls to a dependency that keeps
//!   failing, with a timed recovery probe.
//! - [`retry_with_backoff`]: bounded retry with exponential backoff.
//!
//! Both are deliberately decoupled from the sync engine; the engine's own
//! retry accounting (per-action retry counters across passes) lives in
//! `civiport-sync`.

mod breaker;
mod retry;

pub use breaker::{
    BreakerConfig, BreakerConfigBuilder, BreakerError, BreakerMetrics, CircuitBreaker,
    CircuitState, InvalidBreakerConfig,
};
pub use retry::{
    retry_with_backoff, retry_with_backoff_observed, RetryConfig, RetryConfigBuilder, RetryError,
};
