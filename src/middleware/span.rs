use std::time::Instant;

use tracing::debug;

use crate::pipeline::{Context, ExecutionError, Middleware, OpenSpan, Position, Stack};

const INITIALIZE: &str = "Initialize";
const BUILD_REQUEST: &str = "BuildRequest";

/// Opens a named tracing span over a region of the stack
///
/// The executor runs every following step inside it until the matching
/// [`SpanEnd`] closes it.
#[derive(Debug, Clone, Copy)]
pub struct SpanStart {
    id: &'static str,
    name: &'static str,
}

/// Closes the span opened by the matching [`SpanStart`]
#[derive(Debug, Clone, Copy)]
pub struct SpanEnd {
    id: &'static str,
    name: &'static str,
}

impl SpanStart {
    pub fn new(id: &'static str, name: &'static str) -> Self {
        Self { id, name }
    }
}

impl SpanEnd {
    pub fn new(id: &'static str, name: &'static str) -> Self {
        Self { id, name }
    }
}

fn close_span(ctx: &mut Context, name: &str, err: Option<&ExecutionError>) {
    let Some(index) = ctx.spans.iter().rposition(|open| open.name == name) else {
        return;
    };
    let open = ctx.spans.remove(index);
    let elapsed_us = open.started.elapsed().as_micros() as u64;
    let _entered = open.span.enter();
    match err {
        Some(err) => debug!(elapsed_us, error = %err, "span {} failed", name),
        None => debug!(elapsed_us, "span {} finished", name),
    }
}

impl Middleware for SpanStart {
    fn id(&self) -> &str {
        self.id
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let span = tracing::debug_span!(
            "pipeline",
            region = self.name,
            operation = %ctx.operation(),
            attempt = ctx.attempt()
        );
        ctx.spans.push(OpenSpan {
            name: self.name,
            span,
            started: Instant::now(),
        });
        Ok(())
    }

    fn handle_error(&self, ctx: &mut Context, err: ExecutionError) -> ExecutionError {
        close_span(ctx, self.name, Some(&err));
        err
    }
}

impl Middleware for SpanEnd {
    fn id(&self) -> &str {
        self.id
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        close_span(ctx, self.name, None);
        Ok(())
    }
}

/// Span over the initialize phase
pub fn add_span_initialize(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack
        .initialize
        .add(SpanStart::new("spanInitializeStart", INITIALIZE), Position::Before)?;
    stack
        .initialize
        .add(SpanEnd::new("spanInitializeEnd", INITIALIZE), Position::After)
}

/// Span from the start of serialize to the end of build
pub fn add_span_build_request(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack
        .serialize
        .add(SpanStart::new("spanBuildRequestStart", BUILD_REQUEST), Position::Before)?;
    stack
        .build
        .add(SpanEnd::new("spanBuildRequestEnd", BUILD_REQUEST), Position::After)
}
