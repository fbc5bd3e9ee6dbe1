//! Service operations and the awsJson1.1 protocol they share.

mod codec;
mod put_image_scanning_configuration;
mod types;

pub use codec::{
    CONTENT_TYPE, ERROR_TYPE_HEADER, InputDefaults, JsonDeserializer, JsonSerializer,
    TARGET_HEADER, decode_error, sanitize_error_code,
};
pub use put_image_scanning_configuration::{
    PutImageScanningConfiguration, PutImageScanningConfigurationInput,
    PutImageScanningConfigurationOutput,
};
pub use types::ImageScanningConfiguration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::config::Options;
use crate::middleware;
use crate::pipeline::{ErrorFault, ExecutionError, Position, Stack};

/// Service id used in errors, metadata and the user agent
pub const SERVICE_ID: &str = "ECR";
/// Name the service is signed under
pub const SIGNING_NAME: &str = "ecr";
/// Prefix of the `X-Amz-Target` header
pub const TARGET_PREFIX: &str = "AmazonEC2ContainerRegistry_V20150921";

/// An operation spoken over awsJson1.1
///
/// Implementors are marker types; the associated types carry the payloads.
pub trait JsonOperation: Sized + Send + Sync + 'static {
    /// Operation name, also the suffix of `X-Amz-Target`
    const NAME: &'static str;

    type Input: Serialize + Validate + Send + Sync + 'static;
    type Output: DeserializeOwned + Default + Send + Sync + 'static;

    /// Fill in members with documented defaults before validation
    fn apply_defaults(_input: &mut Self::Input) {}

    /// Which side is at fault for an error code this operation documents
    fn error_fault(_code: &str) -> ErrorFault {
        ErrorFault::Unknown
    }

    fn add_middlewares(stack: &mut Stack, options: &Options) -> Result<(), ExecutionError> {
        add_json_operation_middlewares::<Self>(stack, options)
    }
}

/// Assemble the standard stack for a JSON operation
///
/// Registration order matters: several steps are positioned relative to
/// steps added before them.
pub fn add_json_operation_middlewares<O: JsonOperation>(
    stack: &mut Stack,
    options: &Options,
) -> Result<(), ExecutionError> {
    stack
        .serialize
        .add(JsonSerializer::<O>::new(), Position::After)?;
    stack
        .deserialize
        .add(JsonDeserializer::<O>::new(), Position::After)?;

    middleware::add_client_request_id(stack)?;
    middleware::add_compute_content_length(stack)?;
    middleware::add_resolve_endpoint(stack, options)?;
    middleware::add_compute_payload_hash(stack)?;
    middleware::add_retry(stack, options)?;
    middleware::add_signing(stack, options)?;
    middleware::add_raw_response_to_metadata(stack)?;
    middleware::add_record_response_timing(stack, options)?;
    middleware::add_client_user_agent(stack, options, SERVICE_ID)?;
    middleware::add_error_close_response_body(stack)?;
    middleware::add_close_response_body(stack)?;

    middleware::add_validation::<O::Input>(stack)?;
    stack
        .initialize
        .add(InputDefaults::<O>::new(), Position::Before)?;
    middleware::add_service_metadata(stack, options, SERVICE_ID, SIGNING_NAME)?;

    middleware::add_recursion_detection(stack)?;
    middleware::add_request_id_retriever(stack)?;
    middleware::add_response_error_wrapper(stack)?;
    middleware::add_request_response_logging(stack, options)?;
    middleware::add_disable_https(stack, options)?;

    middleware::add_span_initialize(stack)?;
    middleware::add_span_build_request(stack)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::traits::MockTransport;
    use crate::pipeline::Phase;
    use std::sync::Arc;

    fn stack_for(options: &Options) -> Stack {
        let mut stack = Stack::new(PutImageScanningConfiguration::NAME);
        PutImageScanningConfiguration::add_middlewares(&mut stack, options).unwrap();
        stack
    }

    #[test]
    fn test_stack_order() {
        let mut options = Options::new("us-east-1", Arc::new(MockTransport::new(vec![])));
        options.endpoint_options.disable_https = true;
        let stack = stack_for(&options);

        assert_eq!(
            stack.initialize.ids(),
            vec![
                "spanInitializeStart",
                "RegisterServiceMetadata",
                "InputDefaults",
                "OperationInputValidation",
                "spanInitializeEnd",
            ]
        );
        assert_eq!(
            stack.serialize.ids(),
            vec![
                "spanBuildRequestStart",
                "OperationSerializer",
                "ResolveEndpoint",
                "DisableHTTPS",
            ]
        );
        assert_eq!(
            stack.build.ids(),
            vec![
                "ClientRequestID",
                "ComputeContentLength",
                "UserAgent",
                "RecursionDetection",
                "spanBuildRequestEnd",
            ]
        );
        assert_eq!(
            stack.finalize.ids(),
            vec!["Retry", "ComputePayloadHash", "Signing", "RequestLogging"]
        );
        assert_eq!(
            stack.deserialize.ids(),
            vec![
                "RecordResponseTiming",
                "RequestIDRetriever",
                "RawResponseToMetadata",
                "ErrorCloseResponseBody",
                "ResponseErrorWrapper",
                "ResponseLogging",
                "OperationDeserializer",
                "CloseResponseBody",
            ]
        );
        assert!(stack.retryer().is_some());
    }

    #[test]
    fn test_https_step_only_when_disabled() {
        let options = Options::new("us-east-1", Arc::new(MockTransport::new(vec![])));
        let stack = stack_for(&options);
        assert!(!stack.serialize.contains("DisableHTTPS"));
        assert!(
            stack
                .step_ids()
                .iter()
                .all(|(phase, id)| *phase != Phase::Serialize || id != "DisableHTTPS")
        );
    }
}
