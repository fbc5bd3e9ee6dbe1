//! The standard middleware catalogue.
//!
//! Each step is a small [`Middleware`](crate::pipeline::Middleware) with a
//! stable id, plus an `add_*` helper that registers it at its usual position.
//! Operations assemble their stacks from these helpers.

mod content;
mod endpoint;
mod headers;
mod logging;
mod metadata;
mod response;
mod retry;
mod signing;
mod span;
mod validation;

pub use content::{
    CONTENT_SHA256_HEADER, ComputeContentLength, ComputePayloadHash, add_compute_content_length,
    add_compute_payload_hash, payload_hash,
};
pub use endpoint::{
    DefaultEndpointResolver, DisableHttps, ResolveEndpoint, add_disable_https,
    add_resolve_endpoint,
};
pub use headers::{
    ClientRequestId, INVOCATION_ID_HEADER, RecursionDetection, TRACE_ID_HEADER, UserAgent,
    add_client_request_id, add_client_user_agent, add_recursion_detection,
};
pub use logging::{RequestLogging, ResponseLogging, add_request_response_logging};
pub use metadata::{RegisterServiceMetadata, add_service_metadata};
pub use response::{
    CloseResponseBody, ErrorCloseResponseBody, REQUEST_ID_HEADERS, RawResponseToMetadata,
    RecordResponseTiming, RequestIdRetriever, ResponseErrorWrapper, add_close_response_body,
    add_error_close_response_body, add_raw_response_to_metadata, add_record_response_timing,
    add_request_id_retriever, add_response_error_wrapper,
};
pub use retry::{REQUEST_ATTEMPT_HEADER, RetryHeader, add_retry};
pub use signing::{Signing, add_signing};
pub use span::{SpanEnd, SpanStart, add_span_build_request, add_span_initialize};
pub use validation::{ValidateInput, add_validation, describe};
