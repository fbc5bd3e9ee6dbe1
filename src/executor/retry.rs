//! Retry policy: attempt limits, error classification and backoff.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::pipeline::ExecutionError;

/// Policy consulted by the executor after a failed attempt
pub trait Retryer: Send + Sync {
    /// Upper bound on attempts, the first one included
    fn max_attempts(&self) -> u32;

    fn is_retryable(&self, err: &ExecutionError) -> bool;

    /// Delay before attempt `attempt + 1`, `attempt` being 1-based
    fn retry_delay(&self, attempt: u32, err: &ExecutionError) -> Duration;

    /// Short name reported in the user agent
    fn mode(&self) -> &'static str {
        "standard"
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The service asked us to slow down
    Throttling,
    /// Transport failure, 5xx, or a code listed as transient
    Transient,
    /// Never retried
    Permanent,
}

/// Classify an error using the code and status tables in `config`
pub fn classify(config: &RetryConfig, err: &ExecutionError) -> ErrorClass {
    if err.is_canceled() {
        return ErrorClass::Permanent;
    }

    let class = match err.root() {
        ExecutionError::Transport(_) => ErrorClass::Transient,
        ExecutionError::Service(service) if config.is_throttle_code(&service.code) => {
            ErrorClass::Throttling
        }
        ExecutionError::Service(service) if config.is_transient_code(&service.code) => {
            ErrorClass::Transient
        }
        _ => ErrorClass::Permanent,
    };

    if class != ErrorClass::Permanent {
        return class;
    }

    // Only failures that came back with a response are worth a status check;
    // validation or serialization errors never reach the wire.
    match (err.root(), err.http_status()) {
        (
            ExecutionError::Service(_) | ExecutionError::Deserialization { .. },
            Some(status),
        ) if config.is_retryable_status(status) => ErrorClass::Transient,
        _ => ErrorClass::Permanent,
    }
}

/// Computes exponential backoff with optional jitter
#[derive(Debug, Clone)]
pub struct BackoffCalculator;

impl BackoffCalculator {
    /// Delay after the given attempt (1-based)
    pub fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let pow = config.backoff_multiplier.powi(exponent);
        let delay_ms = ((config.initial_backoff_ms as f32 * pow) as u64).min(config.max_backoff_ms);

        let jitter = config.jitter_factor.clamp(0.0, 1.0);
        if jitter > 0.0 && delay_ms > 0 {
            let mut rng = rand::rng();
            let scale: f32 = rng.random_range(-jitter..=jitter);
            let jitter_ms = (delay_ms as f32 * scale).round() as i64;
            let adjusted = (delay_ms as i64 + jitter_ms).max(0) as u64;
            return Duration::from_millis(adjusted.min(config.max_backoff_ms));
        }

        Duration::from_millis(delay_ms)
    }
}

/// Table-driven retryer with exponential backoff
#[derive(Debug, Clone)]
pub struct StandardRetryer {
    config: RetryConfig,
}

impl StandardRetryer {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl Default for StandardRetryer {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl Retryer for StandardRetryer {
    fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    fn is_retryable(&self, err: &ExecutionError) -> bool {
        classify(&self.config, err) != ErrorClass::Permanent
    }

    fn retry_delay(&self, attempt: u32, _err: &ExecutionError) -> Duration {
        BackoffCalculator::calculate_delay(&self.config, attempt)
    }
}

/// A retryer that never retries
#[derive(Debug, Clone, Copy, Default)]
pub struct NopRetryer;

impl Retryer for NopRetryer {
    fn max_attempts(&self) -> u32 {
        1
    }

    fn is_retryable(&self, _err: &ExecutionError) -> bool {
        false
    }

    fn retry_delay(&self, _attempt: u32, _err: &ExecutionError) -> Duration {
        Duration::ZERO
    }

    fn mode(&self) -> &'static str {
        "nop"
    }
}
