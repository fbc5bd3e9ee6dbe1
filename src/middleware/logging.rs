use http::HeaderMap;
use tracing::info;

use crate::config::{ClientLogMode, Options};
use crate::pipeline::{Context, ExecutionError, Middleware, Position, Stack};

const REDACTED_HEADERS: [&str; 3] = ["authorization", "x-amz-security-token", "cookie"];

fn format_headers(headers: &HeaderMap) -> String {
    let mut lines: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            let value = if REDACTED_HEADERS.contains(&name.as_str()) {
                "<redacted>"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            format!("{}: {}", name, value)
        })
        .collect();
    lines.sort();
    lines.join(", ")
}

/// Logs the outgoing request of every attempt
#[derive(Debug, Clone, Copy)]
pub struct RequestLogging {
    mode: ClientLogMode,
}

impl RequestLogging {
    pub fn new(mode: ClientLogMode) -> Self {
        Self { mode }
    }
}

impl Middleware for RequestLogging {
    fn id(&self) -> &str {
        "RequestLogging"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        if !self.mode.is_request() {
            return Ok(());
        }
        let request = ctx.request()?;
        let headers = format_headers(&request.headers);
        if self.mode.is_request_with_body() {
            info!(
                operation = %ctx.operation(),
                attempt = ctx.attempt(),
                method = %request.method,
                url = %request.url,
                headers = %headers,
                body = %String::from_utf8_lossy(&request.body),
                "Request"
            );
        } else {
            info!(
                operation = %ctx.operation(),
                attempt = ctx.attempt(),
                method = %request.method,
                url = %request.url,
                headers = %headers,
                "Request"
            );
        }
        Ok(())
    }
}

/// Logs the raw response of every attempt before it is decoded
#[derive(Debug, Clone, Copy)]
pub struct ResponseLogging {
    mode: ClientLogMode,
}

impl ResponseLogging {
    pub fn new(mode: ClientLogMode) -> Self {
        Self { mode }
    }
}

impl Middleware for ResponseLogging {
    fn id(&self) -> &str {
        "ResponseLogging"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        if !self.mode.is_response() {
            return Ok(());
        }
        let response = ctx.response()?;
        let headers = format_headers(&response.headers);
        if self.mode.is_response_with_body() {
            let body = response.body.bytes()?;
            info!(
                operation = %ctx.operation(),
                attempt = ctx.attempt(),
                status = response.status.as_u16(),
                headers = %headers,
                body = %String::from_utf8_lossy(body),
                "Response"
            );
        } else {
            info!(
                operation = %ctx.operation(),
                attempt = ctx.attempt(),
                status = response.status.as_u16(),
                headers = %headers,
                "Response"
            );
        }
        Ok(())
    }
}

/// Registers both loggers; the response logger sits just ahead of the
/// operation deserializer
pub fn add_request_response_logging(stack: &mut Stack, options: &Options) -> Result<(), ExecutionError> {
    stack
        .finalize
        .add(RequestLogging::new(options.log_mode), Position::After)?;
    stack.deserialize.insert(
        ResponseLogging::new(options.log_mode),
        "OperationDeserializer",
        Position::Before,
    )
}
