use serde::{Deserialize, Serialize};
use validator::Validate;

/// Retry behavior for a client
///
/// `max_attempts` counts the first attempt, so `1` disables retries.
/// Delays follow `initial_backoff_ms * backoff_multiplier^n`, capped at
/// `max_backoff_ms`, then spread by `D * (1 + U[-j, +j])` where j is
/// `jitter_factor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    #[validate(range(min = 1.0))]
    pub backoff_multiplier: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub jitter_factor: f32,
    /// Error codes the service uses to signal throttling
    pub throttle_codes: Vec<String>,
    /// Error codes for transient failures worth another attempt
    pub transient_codes: Vec<String>,
    /// Response statuses retried regardless of the decoded error
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 20_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
            throttle_codes: to_strings(&[
                "Throttling",
                "ThrottlingException",
                "ThrottledException",
                "RequestThrottledException",
                "TooManyRequestsException",
                "ProvisionedThroughputExceededException",
                "TransactionInProgressException",
                "RequestLimitExceeded",
                "BandwidthLimitExceeded",
                "LimitExceededException",
                "RequestThrottled",
                "SlowDown",
                "PriorRequestNotComplete",
                "EC2ThrottledException",
            ]),
            transient_codes: to_strings(&[
                "RequestTimeout",
                "RequestTimeoutException",
                "InternalError",
            ]),
            retryable_statuses: vec![500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// A configuration that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn is_throttle_code(&self, code: &str) -> bool {
        self.throttle_codes.iter().any(|c| c == code)
    }

    pub fn is_transient_code(&self, code: &str) -> bool {
        self.transient_codes.iter().any(|c| c == code)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

fn to_strings(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}
