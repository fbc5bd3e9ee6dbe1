use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::ExecutionError;
use crate::http::{HttpRequest, HttpResponse};

/// Well-known metadata keys written by the standard middleware
pub mod keys {
    pub const REQUEST_ID: &str = "requestId";
    pub const INVOCATION_ID: &str = "invocationId";
    pub const ATTEMPTS: &str = "attempts";
    pub const LATENCY_MS: &str = "latencyMs";
    pub const RESPONSE_AT: &str = "responseAt";
    pub const CLOCK_SKEW_MS: &str = "clockSkewMs";
    pub const HTTP_STATUS: &str = "httpStatus";
    pub const OPERATION: &str = "operation";
}

/// Metadata pertaining to an operation's result
///
/// A bag of JSON values keyed by name. Steps record what they observe
/// (request id, timing, status) and the bag is handed to the caller with the
/// output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    values: HashMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Builder-style variant of [`Metadata::set`]
    ///
    /// # Example
    /// ```
    /// use ecrscan::pipeline::Metadata;
    /// use serde_json::json;
    ///
    /// let md = Metadata::new()
    ///     .with_value("requestId", json!("3f1c9a"))
    ///     .with_value("attempts", json!(1));
    /// assert_eq!(md.request_id(), Some("3f1c9a"));
    /// ```
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Get a value by key (top-level only)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get(keys::REQUEST_ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn invocation_id(&self) -> Option<&str> {
        self.get(keys::INVOCATION_ID).and_then(Value::as_str)
    }

    /// Number of attempts the call took, retries included
    pub fn attempts(&self) -> Option<u32> {
        self.get(keys::ATTEMPTS)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    pub fn latency(&self) -> Option<Duration> {
        self.get(keys::LATENCY_MS)
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
    }

    pub fn response_at(&self) -> Option<DateTime<Utc>> {
        self.get(keys::RESPONSE_AT)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Server clock minus local clock, from the response `Date` header
    pub fn clock_skew(&self) -> Option<chrono::Duration> {
        self.get(keys::CLOCK_SKEW_MS)
            .and_then(Value::as_i64)
            .map(chrono::Duration::milliseconds)
    }

    pub fn http_status(&self) -> Option<u16> {
        self.get(keys::HTTP_STATUS)
            .and_then(Value::as_u64)
            .and_then(|n| u16::try_from(n).ok())
    }
}

/// Identity of the service and operation a call targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMetadata {
    pub service_id: String,
    pub signing_name: String,
    pub region: String,
    pub operation: String,
}

pub(crate) struct OpenSpan {
    pub(crate) name: &'static str,
    pub(crate) span: tracing::Span,
    pub(crate) started: Instant,
}

/// Per-call execution state shared by every step of the stack
///
/// The input is stored type-erased so steps can be held as trait objects;
/// typed steps recover it with [`Context::input`].
pub struct Context {
    operation: String,
    invocation_id: String,
    started_at: Instant,
    input: Box<dyn Any + Send + Sync>,
    output: Option<Box<dyn Any + Send + Sync>>,
    attempt: u32,
    max_attempts: u32,
    pub(crate) spans: Vec<OpenSpan>,
    /// Set by the service-metadata step during initialize
    pub service: Option<ServiceMetadata>,
    /// The request being built for the current attempt
    pub request: Option<HttpRequest>,
    /// The response of the current attempt
    pub response: Option<HttpResponse>,
    pub metadata: Metadata,
}

impl Context {
    pub fn new<I>(operation: impl Into<String>, input: I) -> Self
    where
        I: Any + Send + Sync,
    {
        let operation = operation.into();
        let invocation_id = uuid::Uuid::new_v4().to_string();
        let metadata = Metadata::new()
            .with_value(keys::OPERATION, Value::String(operation.clone()))
            .with_value(keys::INVOCATION_ID, Value::String(invocation_id.clone()));

        Self {
            operation,
            invocation_id,
            started_at: Instant::now(),
            input: Box::new(input),
            output: None,
            attempt: 0,
            max_attempts: 1,
            spans: Vec::new(),
            service: None,
            request: None,
            response: None,
            metadata,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Client-generated id shared by every attempt of this call
    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// 1-based attempt number; 0 before the first attempt starts
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Reset per-attempt state: a fresh request, no response
    pub(crate) fn begin_attempt(&mut self, attempt: u32, max_attempts: u32) {
        self.attempt = attempt;
        self.max_attempts = max_attempts;
        self.request = Some(HttpRequest::new());
        self.response = None;
        self.metadata
            .set(keys::ATTEMPTS, Value::from(attempt));
    }

    /// Innermost span opened by a span-start step, if any is still open
    pub(crate) fn current_span(&self) -> tracing::Span {
        self.spans
            .last()
            .map_or_else(tracing::Span::none, |open| open.span.clone())
    }

    /// Drop the current response, releasing its body
    pub(crate) fn release_response(&mut self) {
        if let Some(mut response) = self.response.take() {
            response.body.close();
        }
    }

    pub fn input<I: Any>(&self) -> Result<&I, ExecutionError> {
        self.input.downcast_ref::<I>().ok_or_else(|| {
            ExecutionError::stack(format!(
                "unexpected input type, expected {}",
                std::any::type_name::<I>()
            ))
        })
    }

    pub fn input_mut<I: Any>(&mut self) -> Result<&mut I, ExecutionError> {
        self.input.downcast_mut::<I>().ok_or_else(|| {
            ExecutionError::stack(format!(
                "unexpected input type, expected {}",
                std::any::type_name::<I>()
            ))
        })
    }

    pub fn set_output<O: Any + Send + Sync>(&mut self, output: O) {
        self.output = Some(Box::new(output));
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Take the typed output; `None` when absent or of another type
    pub fn take_output<O: Any>(&mut self) -> Option<O> {
        let output = self.output.take()?;
        match output.downcast::<O>() {
            Ok(output) => Some(*output),
            Err(other) => {
                self.output = Some(other);
                None
            }
        }
    }

    pub fn request(&self) -> Result<&HttpRequest, ExecutionError> {
        self.request
            .as_ref()
            .ok_or_else(|| ExecutionError::stack("no request in the current phase"))
    }

    pub fn request_mut(&mut self) -> Result<&mut HttpRequest, ExecutionError> {
        self.request
            .as_mut()
            .ok_or_else(|| ExecutionError::stack("no request in the current phase"))
    }

    pub fn response(&self) -> Result<&HttpResponse, ExecutionError> {
        self.response
            .as_ref()
            .ok_or_else(|| ExecutionError::stack("no response in the current phase"))
    }

    pub fn into_metadata(self) -> Metadata {
        self.metadata
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("operation", &self.operation)
            .field("invocation_id", &self.invocation_id)
            .field("attempt", &self.attempt)
            .field("max_attempts", &self.max_attempts)
            .field("service", &self.service)
            .field("request", &self.request)
            .field("response", &self.response)
            .field("has_output", &self.output.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_metadata() {
        let md = Metadata::new();
        assert!(md.values.is_empty());
        assert_eq!(md.request_id(), None);
    }

    #[test]
    fn test_with_value() {
        let md = Metadata::new()
            .with_value("requestId", json!("abc"))
            .with_value("attempts", json!(2));

        assert_eq!(md.request_id(), Some("abc"));
        assert_eq!(md.attempts(), Some(2));
    }

    #[test]
    fn test_empty_request_id_is_absent() {
        let md = Metadata::new().with_value(keys::REQUEST_ID, json!(""));
        assert_eq!(md.request_id(), None);
    }

    #[test]
    fn test_typed_accessors() {
        let md = Metadata::new()
            .with_value(keys::LATENCY_MS, json!(42))
            .with_value(keys::CLOCK_SKEW_MS, json!(-1500))
            .with_value(keys::HTTP_STATUS, json!(200))
            .with_value(keys::RESPONSE_AT, json!("2024-01-02T03:04:05Z"));

        assert_eq!(md.latency(), Some(Duration::from_millis(42)));
        assert_eq!(md.clock_skew(), Some(chrono::Duration::milliseconds(-1500)));
        assert_eq!(md.http_status(), Some(200));
        assert_eq!(
            md.response_at().map(|t| t.to_rfc3339()),
            Some("2024-01-02T03:04:05+00:00".to_string())
        );
    }

    #[test]
    fn test_context_records_identity() {
        let ctx = Context::new("PutImageScanningConfiguration", 7u32);
        assert_eq!(ctx.operation(), "PutImageScanningConfiguration");
        assert!(!ctx.invocation_id().is_empty());
        assert_eq!(ctx.metadata.invocation_id(), Some(ctx.invocation_id()));
        assert_eq!(ctx.attempt(), 0);
    }

    #[test]
    fn test_input_downcast() {
        let mut ctx = Context::new("Op", String::from("input"));
        assert_eq!(ctx.input::<String>().unwrap(), "input");
        ctx.input_mut::<String>().unwrap().push('!');
        assert_eq!(ctx.input::<String>().unwrap(), "input!");
        assert!(matches!(
            ctx.input::<u32>(),
            Err(ExecutionError::Stack { .. })
        ));
    }

    #[test]
    fn test_take_output_wrong_type_keeps_value() {
        let mut ctx = Context::new("Op", ());
        ctx.set_output(5u8);
        assert_eq!(ctx.take_output::<String>(), None);
        assert!(ctx.has_output());
        assert_eq!(ctx.take_output::<u8>(), Some(5));
        assert!(!ctx.has_output());
    }

    #[test]
    fn test_begin_attempt_resets_request() {
        let mut ctx = Context::new("Op", ());
        assert!(ctx.request().is_err());

        ctx.begin_attempt(1, 3);
        ctx.request_mut().unwrap().url = "https://example.com".to_string();
        ctx.begin_attempt(2, 3);

        assert_eq!(ctx.request().unwrap().url, "");
        assert_eq!(ctx.attempt(), 2);
        assert_eq!(ctx.metadata.attempts(), Some(2));
    }
}
