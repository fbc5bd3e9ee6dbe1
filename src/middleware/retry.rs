use crate::config::Options;
use crate::pipeline::{Context, ExecutionError, Middleware, Position, Stack};

pub const REQUEST_ATTEMPT_HEADER: &str = "amz-sdk-request";

/// Tells the service which attempt this is, e.g. `attempt=2; max=3`
///
/// The retry loop itself lives in the executor; registering this step also
/// installs the retryer on the stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryHeader;

impl Middleware for RetryHeader {
    fn id(&self) -> &str {
        "Retry"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let value = format!("attempt={}; max={}", ctx.attempt(), ctx.max_attempts());
        ctx.request_mut()?.set_header(REQUEST_ATTEMPT_HEADER, &value)
    }
}

pub fn add_retry(stack: &mut Stack, options: &Options) -> Result<(), ExecutionError> {
    stack.set_retryer(options.retryer());
    stack.finalize.add(RetryHeader, Position::Before)
}
