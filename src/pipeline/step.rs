use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Context, ExecutionError};

/// The fixed stages an operation call passes through, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Input defaulting and validation, runs once per call
    Initialize,
    /// Encode the input into a request
    Serialize,
    /// Decorate the request (headers, lengths)
    Build,
    /// Retry bookkeeping, checksums, signing
    Finalize,
    /// Decode the response
    Deserialize,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Initialize,
        Phase::Serialize,
        Phase::Build,
        Phase::Finalize,
        Phase::Deserialize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initialize => "Initialize",
            Phase::Serialize => "Serialize",
            Phase::Build => "Build",
            Phase::Finalize => "Finalize",
            Phase::Deserialize => "Deserialize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a step is placed: front/back of a phase, or before/after another step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Before,
    After,
}

/// A single named step in a middleware stack
///
/// `handle` runs in stack order. When the step itself or anything after it
/// fails, the executor unwinds through the steps whose `handle` was entered,
/// in reverse order, calling `handle_error`, which may wrap the error or
/// release resources. Steps that never ran are skipped.
pub trait Middleware: Send + Sync {
    /// Unique id within the step's phase
    fn id(&self) -> &str;

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError>;

    fn handle_error(&self, _ctx: &mut Context, err: ExecutionError) -> ExecutionError {
        err
    }
}

/// A step built from a closure
///
/// Handy for per-call customisation and for tests.
pub struct FnStep<F> {
    id: String,
    f: F,
}

impl<F> FnStep<F>
where
    F: Fn(&mut Context) -> Result<(), ExecutionError> + Send + Sync,
{
    pub fn new(id: impl Into<String>, f: F) -> Self {
        Self { id: id.into(), f }
    }
}

impl<F> Middleware for FnStep<F>
where
    F: Fn(&mut Context) -> Result<(), ExecutionError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        (self.f)(ctx)
    }
}
