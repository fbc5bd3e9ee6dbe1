use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span};

use crate::config::{ClientConfig, ConfigError, OptFn, Options};
use crate::executor::Executor;
use crate::operations::{JsonOperation, SERVICE_ID};
use crate::pipeline::{Context, ExecutionError, Metadata, OperationError, Stack, keys};

/// Client for the container registry API
///
/// Cloning is cheap and clones share the same options. A client holds no
/// mutable state, so one instance can serve concurrent calls.
#[derive(Debug, Clone)]
pub struct Client {
    options: Arc<Options>,
}

impl Client {
    pub fn new(options: Options) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    /// Build a client with the `reqwest` transport from declarative config
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(Options::from_config(config)?))
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Run one operation through a freshly assembled middleware stack
    ///
    /// Returns the decoded output together with the call metadata. On
    /// success the metadata always carries a request id: the service's when
    /// it sent one, otherwise the client invocation id.
    pub async fn invoke_operation<O: JsonOperation>(
        &self,
        cancel: &CancellationToken,
        input: O::Input,
        opt_fns: &[OptFn],
    ) -> Result<(O::Output, Metadata), OperationError> {
        let fail = |source: ExecutionError| OperationError::new(SERVICE_ID, O::NAME, source);

        let mut options = Options::clone(&self.options);
        for opt_fn in opt_fns {
            opt_fn(&mut options);
        }

        let mut stack = Stack::new(O::NAME);
        O::add_middlewares(&mut stack, &options).map_err(fail)?;

        let mut ctx = Context::new(O::NAME, input);
        let span = info_span!(
            "operation",
            rpc.service = SERVICE_ID,
            rpc.method = O::NAME,
            invocation_id = %ctx.invocation_id()
        );

        let executor =
            Executor::new(options.http_client.as_ref(), cancel).with_log_mode(options.log_mode);
        executor
            .execute(&stack, &mut ctx)
            .instrument(span)
            .await
            .map_err(fail)?;

        let output = ctx.take_output::<O::Output>().ok_or_else(|| {
            fail(ExecutionError::stack(format!(
                "{} produced no output",
                O::NAME
            )))
        })?;

        let mut metadata = ctx.into_metadata();
        if metadata.request_id().is_none() {
            if let Some(invocation_id) = metadata.invocation_id().map(str::to_string) {
                metadata.set(keys::REQUEST_ID, Value::String(invocation_id));
            }
        }
        debug!(
            operation = O::NAME,
            request_id = metadata.request_id().unwrap_or_default(),
            attempts = metadata.attempts().unwrap_or_default(),
            "Operation completed"
        );
        Ok((output, metadata))
    }
}
