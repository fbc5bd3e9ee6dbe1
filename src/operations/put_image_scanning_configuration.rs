use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use validator::Validate;

use super::{ImageScanningConfiguration, JsonOperation};
use crate::client::Client;
use crate::config::OptFn;
use crate::pipeline::{ErrorFault, Metadata, OperationError};

/// Updates the image scanning configuration of a repository
#[derive(Debug, Clone, Copy, Default)]
pub struct PutImageScanningConfiguration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PutImageScanningConfigurationInput {
    /// Scanning settings to apply
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(required(message = "missing required field"))]
    pub image_scanning_configuration: Option<ImageScanningConfiguration>,

    /// Repository to update
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(
        required(message = "missing required field"),
        length(min = 1, message = "missing required field")
    )]
    pub repository_name: Option<String>,

    /// Registry that contains the repository; the caller's default registry
    /// when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
}

impl PutImageScanningConfigurationInput {
    pub fn new(repository_name: impl Into<String>, configuration: ImageScanningConfiguration) -> Self {
        Self {
            image_scanning_configuration: Some(configuration),
            repository_name: Some(repository_name.into()),
            registry_id: None,
        }
    }

    pub fn with_registry_id(mut self, registry_id: impl Into<String>) -> Self {
        self.registry_id = Some(registry_id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutImageScanningConfigurationOutput {
    /// Scanning settings now in effect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_scanning_configuration: Option<ImageScanningConfiguration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,

    /// Request id, attempts, timing and status of the call
    #[serde(skip)]
    pub result_metadata: Metadata,
}

impl JsonOperation for PutImageScanningConfiguration {
    const NAME: &'static str = "PutImageScanningConfiguration";

    type Input = PutImageScanningConfigurationInput;
    type Output = PutImageScanningConfigurationOutput;

    fn error_fault(code: &str) -> ErrorFault {
        match code {
            "InvalidParameterException" | "RepositoryNotFoundException" | "ValidationException" => {
                ErrorFault::Client
            }
            "ServerException" => ErrorFault::Server,
            _ => ErrorFault::Unknown,
        }
    }
}

impl Client {
    /// Updates the image scanning configuration for the specified repository.
    ///
    /// The input is validated before any request is sent. `opt_fns` adjust a
    /// copy of the client options for this call only. Cancelling `cancel`
    /// aborts the call at the next phase boundary, during the HTTP exchange,
    /// or while waiting to retry.
    pub async fn put_image_scanning_configuration(
        &self,
        cancel: &CancellationToken,
        params: PutImageScanningConfigurationInput,
        opt_fns: &[OptFn],
    ) -> Result<PutImageScanningConfigurationOutput, OperationError> {
        let (mut output, metadata) = self
            .invoke_operation::<PutImageScanningConfiguration>(cancel, params, opt_fns)
            .await?;
        output.result_metadata = metadata;
        Ok(output)
    }
}
