use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use validator::Validate;

use super::{ClientConfig, ClientLogMode, ConfigError, RetryConfig};
use crate::executor::retry::{NopRetryer, Retryer, StandardRetryer};
use crate::executor::traits::{
    AnonymousSigner, CredentialsProvider, EndpointResolver, HttpTransport, Signer,
    SystemTimeProvider, TimeProvider,
};
use crate::http::ReqwestTransport;
use crate::middleware::DefaultEndpointResolver;

/// A per-call override applied to a copy of the client's [`Options`]
pub type OptFn = Arc<dyn Fn(&mut Options) + Send + Sync>;

/// Endpoint-related switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointOptions {
    /// Rewrite resolved endpoints to plain http
    pub disable_https: bool,
}

/// Runtime options for a client
///
/// Cheap to clone: collaborators are shared behind `Arc`. The client keeps one
/// copy and never mutates it; per-call overrides work on a clone.
#[derive(Clone)]
pub struct Options {
    pub region: String,
    pub base_endpoint: Option<String>,
    pub endpoint_options: EndpointOptions,
    pub retry: RetryConfig,
    /// Replaces the retryer built from `retry` when set
    pub retryer: Option<Arc<dyn Retryer>>,
    pub log_mode: ClientLogMode,
    pub app_id: Option<String>,
    pub credentials: Option<Arc<dyn CredentialsProvider>>,
    pub signer: Arc<dyn Signer>,
    pub endpoint_resolver: Arc<dyn EndpointResolver>,
    pub http_client: Arc<dyn HttpTransport>,
    pub time: Arc<dyn TimeProvider>,
}

impl Options {
    /// Options with default collaborators around the given transport
    pub fn new(region: impl Into<String>, http_client: Arc<dyn HttpTransport>) -> Self {
        Self {
            region: region.into(),
            base_endpoint: None,
            endpoint_options: EndpointOptions::default(),
            retry: RetryConfig::default(),
            retryer: None,
            log_mode: ClientLogMode::default(),
            app_id: None,
            credentials: None,
            signer: Arc::new(AnonymousSigner),
            endpoint_resolver: Arc::new(DefaultEndpointResolver),
            http_client,
            time: Arc::new(SystemTimeProvider),
        }
    }

    /// Validate a [`ClientConfig`] and build options using the `reqwest` transport
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.timeout_secs.map(Duration::from_secs))?;

        let mut options = Self::new(config.region.clone(), Arc::new(transport));
        options.base_endpoint = config.base_endpoint.clone();
        options.endpoint_options.disable_https = config.disable_https;
        options.retry = config.retry.clone();
        options.log_mode = config.log_mode;
        options.app_id = config.app_id.clone();
        Ok(options)
    }

    /// The retry policy calls made with these options will use
    pub fn retryer(&self) -> Arc<dyn Retryer> {
        match &self.retryer {
            Some(retryer) => retryer.clone(),
            None if self.retry.max_attempts <= 1 => Arc::new(NopRetryer),
            None => Arc::new(StandardRetryer::new(self.retry.clone())),
        }
    }

    pub fn with_base_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.base_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = signer;
        self
    }

    pub fn with_time(mut self, time: Arc<dyn TimeProvider>) -> Self {
        self.time = time;
        self
    }

    pub fn with_log_mode(mut self, log_mode: ClientLogMode) -> Self {
        self.log_mode = log_mode;
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("region", &self.region)
            .field("base_endpoint", &self.base_endpoint)
            .field("endpoint_options", &self.endpoint_options)
            .field("retry", &self.retry)
            .field("custom_retryer", &self.retryer.is_some())
            .field("log_mode", &self.log_mode)
            .field("app_id", &self.app_id)
            .field("credentials", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::traits::MockTransport;

    fn options() -> Options {
        Options::new("us-east-1", Arc::new(MockTransport::new(vec![])))
    }

    #[test]
    fn test_default_retryer_follows_config() {
        let opts = options();
        assert_eq!(opts.retryer().max_attempts(), 3);
        assert_eq!(opts.retryer().mode(), "standard");

        let opts = options().with_retry(RetryConfig::no_retry());
        assert_eq!(opts.retryer().max_attempts(), 1);
        assert_eq!(opts.retryer().mode(), "nop");
    }

    #[test]
    fn test_custom_retryer_wins() {
        let mut opts = options();
        opts.retryer = Some(Arc::new(NopRetryer));
        assert_eq!(opts.retryer().max_attempts(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig::from_json(
            r#"{"region": "eu-central-1", "disableHttps": true, "appId": "ci"}"#,
        )
        .unwrap();
        let opts = Options::from_config(&config).unwrap();
        assert_eq!(opts.region, "eu-central-1");
        assert!(opts.endpoint_options.disable_https);
        assert_eq!(opts.app_id.as_deref(), Some("ci"));
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = ClientConfig::default();
        assert!(matches!(
            Options::from_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }
}
