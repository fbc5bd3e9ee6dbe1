//! Client configuration
//!
//! [`ClientConfig`] is the declarative, serde-loadable form; [`Options`] is
//! the runtime form holding the collaborators a call uses.

mod client;
mod logging;
mod options;
mod retry;

pub use client::{ClientConfig, ConfigError};
pub use logging::ClientLogMode;
pub use options::{EndpointOptions, OptFn, Options};
pub use retry::RetryConfig;
