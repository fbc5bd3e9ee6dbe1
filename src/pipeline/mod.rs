//! Middleware pipeline types
//!
//! This module contains the types an operation call is made of: the
//! per-call [`Context`], the phased [`Stack`] of [`Middleware`] steps, and
//! the error taxonomy.

mod context;
mod error;
mod stack;
mod step;

pub use context::{Context, Metadata, ServiceMetadata, keys};
pub(crate) use context::OpenSpan;
pub use error::{
    ErrorFault, ExecutionError, OperationError, ServiceError, TransportError, TransportErrorKind,
};
pub use stack::{Stack, StepList};
pub use step::{FnStep, Middleware, Phase, Position};
