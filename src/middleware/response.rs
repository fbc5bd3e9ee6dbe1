use std::sync::Arc;

use chrono::DateTime;
use serde_json::Value;

use crate::config::Options;
use crate::executor::traits::TimeProvider;
use crate::pipeline::{Context, ExecutionError, Middleware, Position, Stack, keys};

/// Response headers that carry the service request id, in lookup order
pub const REQUEST_ID_HEADERS: [&str; 2] = ["x-amzn-RequestId", "x-amz-request-id"];

fn response_request_id(ctx: &Context) -> Option<String> {
    let response = ctx.response.as_ref()?;
    REQUEST_ID_HEADERS
        .iter()
        .find_map(|name| response.header(name))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Records when the response arrived, total latency, and clock skew against
/// the server's `Date` header
pub struct RecordResponseTiming {
    time: Arc<dyn TimeProvider>,
}

impl RecordResponseTiming {
    pub fn new(time: Arc<dyn TimeProvider>) -> Self {
        Self { time }
    }
}

impl Middleware for RecordResponseTiming {
    fn id(&self) -> &str {
        "RecordResponseTiming"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let now = self.time.now();
        let latency_ms = ctx.started_at().elapsed().as_millis() as u64;
        let server_time = ctx
            .response()?
            .header("date")
            .and_then(|date| DateTime::parse_from_rfc2822(date).ok());

        ctx.metadata
            .set(keys::RESPONSE_AT, Value::String(now.to_rfc3339()));
        ctx.metadata.set(keys::LATENCY_MS, Value::from(latency_ms));
        if let Some(server_time) = server_time {
            let skew = server_time.signed_duration_since(now);
            ctx.metadata
                .set(keys::CLOCK_SKEW_MS, Value::from(skew.num_milliseconds()));
        }
        Ok(())
    }
}

/// Copies the service request id into the call metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdRetriever;

impl Middleware for RequestIdRetriever {
    fn id(&self) -> &str {
        "RequestIDRetriever"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        if let Some(request_id) = response_request_id(ctx) {
            ctx.metadata.set(keys::REQUEST_ID, Value::String(request_id));
        }
        Ok(())
    }
}

/// Copies the raw HTTP status into the call metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct RawResponseToMetadata;

impl Middleware for RawResponseToMetadata {
    fn id(&self) -> &str {
        "RawResponseToMetadata"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let status = ctx.response()?.status.as_u16();
        ctx.metadata.set(keys::HTTP_STATUS, Value::from(status));
        Ok(())
    }
}

/// Wraps any failure that happened once a response was received with the
/// HTTP status and request id
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseErrorWrapper;

impl Middleware for ResponseErrorWrapper {
    fn id(&self) -> &str {
        "ResponseErrorWrapper"
    }

    fn handle(&self, _ctx: &mut Context) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn handle_error(&self, ctx: &mut Context, err: ExecutionError) -> ExecutionError {
        if matches!(err, ExecutionError::Response { .. } | ExecutionError::Canceled) {
            return err;
        }
        let Some(response) = ctx.response.as_ref() else {
            return err;
        };
        ExecutionError::Response {
            status: response.status.as_u16(),
            request_id: response_request_id(ctx).unwrap_or_default(),
            source: Box::new(err),
        }
    }
}

/// Releases the response body after a successful decode
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseResponseBody;

impl Middleware for CloseResponseBody {
    fn id(&self) -> &str {
        "CloseResponseBody"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        if let Some(response) = ctx.response.as_mut() {
            response.body.close();
        }
        Ok(())
    }
}

/// Releases the response body when decoding fails
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorCloseResponseBody;

impl Middleware for ErrorCloseResponseBody {
    fn id(&self) -> &str {
        "ErrorCloseResponseBody"
    }

    fn handle(&self, _ctx: &mut Context) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn handle_error(&self, ctx: &mut Context, err: ExecutionError) -> ExecutionError {
        if let Some(response) = ctx.response.as_mut() {
            response.body.close();
        }
        err
    }
}

pub fn add_record_response_timing(stack: &mut Stack, options: &Options) -> Result<(), ExecutionError> {
    stack.deserialize.add(
        RecordResponseTiming::new(options.time.clone()),
        Position::Before,
    )
}

/// Placed ahead of `RawResponseToMetadata`, which must already be registered
pub fn add_request_id_retriever(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack
        .deserialize
        .insert(RequestIdRetriever, "RawResponseToMetadata", Position::Before)
}

pub fn add_raw_response_to_metadata(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack.deserialize.add(RawResponseToMetadata, Position::Before)
}

/// Placed ahead of the operation deserializer so it is unwound after it
pub fn add_response_error_wrapper(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack
        .deserialize
        .insert(ResponseErrorWrapper, "OperationDeserializer", Position::Before)
}

pub fn add_close_response_body(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack.deserialize.add(CloseResponseBody, Position::After)
}

/// Placed ahead of the operation deserializer; the body is closed on the way
/// back out of a failed decode
pub fn add_error_close_response_body(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack
        .deserialize
        .insert(ErrorCloseResponseBody, "OperationDeserializer", Position::Before)
}
