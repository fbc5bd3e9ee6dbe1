use std::marker::PhantomData;

use bytes::Bytes;
use http::Method;
use serde_json::Value;

use super::{JsonOperation, TARGET_PREFIX};
use crate::http::HttpResponse;
use crate::pipeline::{Context, ErrorFault, ExecutionError, Middleware, ServiceError};

pub const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
pub const TARGET_HEADER: &str = "X-Amz-Target";
pub const ERROR_TYPE_HEADER: &str = "X-Amzn-ErrorType";

const SNAPSHOT_LIMIT: usize = 1024;
const UNKNOWN_ERROR_CODE: &str = "UnknownError";

fn snapshot(body: &[u8]) -> String {
    String::from_utf8_lossy(&body[..body.len().min(SNAPSHOT_LIMIT)]).into_owned()
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Fills in input members that have documented defaults
pub struct InputDefaults<O> {
    _operation: PhantomData<fn() -> O>,
}

impl<O> InputDefaults<O> {
    pub fn new() -> Self {
        Self {
            _operation: PhantomData,
        }
    }
}

impl<O> Default for InputDefaults<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: JsonOperation> Middleware for InputDefaults<O> {
    fn id(&self) -> &str {
        "InputDefaults"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        O::apply_defaults(ctx.input_mut::<O::Input>()?);
        Ok(())
    }
}

/// Encodes the input as an awsJson1.1 `POST /` request
pub struct JsonSerializer<O> {
    _operation: PhantomData<fn() -> O>,
}

impl<O> JsonSerializer<O> {
    pub fn new() -> Self {
        Self {
            _operation: PhantomData,
        }
    }
}

impl<O> Default for JsonSerializer<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: JsonOperation> Middleware for JsonSerializer<O> {
    fn id(&self) -> &str {
        "OperationSerializer"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let body = serde_json::to_vec(ctx.input::<O::Input>()?)
            .map_err(|e| ExecutionError::serialization(e.to_string()))?;

        let request = ctx.request_mut()?;
        request.method = Method::POST;
        request.url = "/".to_string();
        request.set_header("Content-Type", CONTENT_TYPE)?;
        request.set_header(TARGET_HEADER, &format!("{}.{}", TARGET_PREFIX, O::NAME))?;
        request.body = Bytes::from(body);
        Ok(())
    }
}

/// Decodes a 2xx response into the operation output, anything else into a
/// [`ServiceError`]
pub struct JsonDeserializer<O> {
    _operation: PhantomData<fn() -> O>,
}

impl<O> JsonDeserializer<O> {
    pub fn new() -> Self {
        Self {
            _operation: PhantomData,
        }
    }
}

impl<O> Default for JsonDeserializer<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: JsonOperation> Middleware for JsonDeserializer<O> {
    fn id(&self) -> &str {
        "OperationDeserializer"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let response = ctx.response()?;
        if !response.is_success() {
            return Err(decode_error(response, O::error_fault));
        }

        let body = response.body.bytes()?;
        let output: O::Output = if is_blank(body) {
            O::Output::default()
        } else {
            serde_json::from_slice(body).map_err(|e| {
                ExecutionError::deserialization(
                    format!("failed to decode response body, {}", e),
                    Some(snapshot(body)),
                )
            })?
        };
        ctx.set_output(output);
        Ok(())
    }
}

/// Strip the namespace prefix (`ns#`) and any suffix after `:` from an error code
pub fn sanitize_error_code(raw: &str) -> &str {
    let code = raw.split(':').next().unwrap_or(raw);
    code.rsplit('#').next().unwrap_or(code).trim()
}

/// Decode an error response
///
/// The code comes from `X-Amzn-ErrorType`, falling back to the body's
/// `__type` or `code`; the message from `message` or `Message`. `fault` maps
/// the code to the side that caused it.
pub fn decode_error<F>(response: &HttpResponse, fault: F) -> ExecutionError
where
    F: Fn(&str) -> ErrorFault,
{
    let status = response.status.as_u16();
    let body = match response.body.bytes() {
        Ok(body) => body,
        Err(err) => return err,
    };
    let header_code = response
        .header(ERROR_TYPE_HEADER)
        .map(sanitize_error_code)
        .filter(|code| !code.is_empty());

    let document: Option<Value> = if is_blank(body) {
        None
    } else {
        match serde_json::from_slice(body) {
            Ok(document) => Some(document),
            Err(_) if header_code.is_some() => None,
            Err(e) => {
                return ExecutionError::deserialization(
                    format!("failed to decode error response, {}", e),
                    Some(snapshot(body)),
                );
            }
        }
    };

    let body_code = document
        .as_ref()
        .and_then(|doc| doc.get("__type").or_else(|| doc.get("code")))
        .and_then(Value::as_str)
        .map(sanitize_error_code)
        .filter(|code| !code.is_empty());
    let code = header_code.or(body_code).unwrap_or(UNKNOWN_ERROR_CODE);

    let message = document.as_ref().and_then(|doc| {
        ["message", "Message", "errorMessage"]
            .iter()
            .find_map(|key| doc.get(*key))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    ServiceError::new(code, message, status)
        .with_fault(fault(code))
        .into()
}
