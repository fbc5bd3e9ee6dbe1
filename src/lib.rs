//! ecrscan - image scanning configuration for container registry repositories
//!
//! Calls run through a phased middleware stack (initialize, serialize, build,
//! finalize, deserialize) assembled per operation from small named steps.
//! The executor drives the stack with retries, cancellation and guaranteed
//! release of response bodies.

pub mod client;
pub mod config;
pub mod executor;
pub mod http;
pub mod middleware;
pub mod operations;
pub mod pipeline;

// Re-export commonly used types
pub use client::Client;
pub use config::{ClientConfig, ClientLogMode, OptFn, Options, RetryConfig};
pub use operations::{
    ImageScanningConfiguration, PutImageScanningConfiguration, PutImageScanningConfigurationInput,
    PutImageScanningConfigurationOutput,
};
pub use pipeline::{Context, ExecutionError, Metadata, Middleware, OperationError, Phase, Stack};
pub use tokio_util::sync::CancellationToken;
