use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use super::{ClientLogMode, RetryConfig};
use crate::pipeline::TransportError;

/// Errors raised while loading client configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error("invalid value for {name}: {value}")]
    Env { name: String, value: String },
    #[error("failed to build http client: {0}")]
    Transport(#[from] TransportError),
}

/// Declarative client configuration
///
/// Every field has a default, so a config file only needs to name what it
/// changes:
/// ```json
/// {
///   "region": "eu-west-1",
///   "retry": {"maxAttempts": 5},
///   "logMode": {"retries": true}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Region the service endpoint is resolved for
    #[validate(length(min = 1, message = "region must not be empty"))]
    pub region: String,

    /// Overrides the resolved endpoint (e.g. a local emulator)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_endpoint: Option<String>,

    /// Rewrite resolved endpoints to plain http
    pub disable_https: bool,

    #[validate(nested)]
    pub retry: RetryConfig,

    pub log_mode: ClientLogMode,

    /// Application id appended to the user agent
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 50))]
    pub app_id: Option<String>,

    /// Per-attempt HTTP timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: String::new(),
            base_endpoint: None,
            disable_https: false,
            retry: RetryConfig::default(),
            log_mode: ClientLogMode::default(),
            app_id: None,
            timeout_secs: Some(60),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Overlay values from environment-style variables
    ///
    /// Recognised: `AWS_REGION` (then `AWS_DEFAULT_REGION`),
    /// `AWS_ENDPOINT_URL_ECR` (then `AWS_ENDPOINT_URL`), `AWS_MAX_ATTEMPTS`,
    /// `AWS_SDK_UA_APP_ID`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(region) = get("AWS_REGION").or_else(|| get("AWS_DEFAULT_REGION")) {
            self.region = region;
        }
        if let Some(endpoint) = get("AWS_ENDPOINT_URL_ECR").or_else(|| get("AWS_ENDPOINT_URL")) {
            self.base_endpoint = Some(endpoint);
        }
        if let Some(value) = get("AWS_MAX_ATTEMPTS") {
            self.retry.max_attempts = value.trim().parse().map_err(|_| ConfigError::Env {
                name: "AWS_MAX_ATTEMPTS".to_string(),
                value,
            })?;
        }
        if let Some(app_id) = get("AWS_SDK_UA_APP_ID") {
            self.app_id = Some(app_id);
        }
        Ok(())
    }
}
