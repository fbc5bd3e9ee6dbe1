//! Middleware stack executor and its collaborators
//!
//! This module contains the operation pipeline runner: it drives a [`Stack`]
//! through its phases for one call, sends the request, and retries.

pub mod retry;
pub mod traits;

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ClientLogMode;
use crate::pipeline::{Context, ExecutionError, Phase, Stack};
use traits::HttpTransport;

/// The pipeline runner
///
/// The executor holds no per-call state; everything a call accumulates lives
/// in the [`Context`]. Phases run as Initialize → Serialize → Build →
/// Finalize → send → Deserialize. Only the retry loop re-enters a phase, and
/// it always re-runs Serialize through Deserialize as a unit.
pub struct Executor<'a> {
    /// Sends the request built by the stack
    pub transport: &'a dyn HttpTransport,
    /// Checked at every phase boundary, raced against sends and backoff sleeps
    pub cancel: &'a CancellationToken,
    pub log_mode: ClientLogMode,
}

impl<'a> Executor<'a> {
    pub fn new(transport: &'a dyn HttpTransport, cancel: &'a CancellationToken) -> Self {
        Self {
            transport,
            cancel,
            log_mode: ClientLogMode::default(),
        }
    }

    pub fn with_log_mode(mut self, log_mode: ClientLogMode) -> Self {
        self.log_mode = log_mode;
        self
    }

    /// Run `stack` to completion for the call described by `ctx`
    ///
    /// On success the typed output is in the context. On failure every step
    /// that ran has had its `handle_error` called and the response of the
    /// last attempt has been released.
    pub async fn execute(&self, stack: &Stack, ctx: &mut Context) -> Result<(), ExecutionError> {
        let mut initialized = Trail::default();
        let result = self.execute_phases(stack, ctx, &mut initialized).await;
        ctx.release_response();

        result.map_err(|err| initialized.unwind(stack, ctx, err))
    }

    async fn execute_phases(
        &self,
        stack: &Stack,
        ctx: &mut Context,
        initialized: &mut Trail,
    ) -> Result<(), ExecutionError> {
        self.run_phase(stack, Phase::Initialize, ctx, initialized)?;

        let retryer = stack.retryer();
        let max_attempts = retryer.map_or(1, |r| r.max_attempts().max(1));
        let mut attempt = 1;

        loop {
            ctx.begin_attempt(attempt, max_attempts);

            let mut trail = Trail::default();
            let err = match self.attempt(stack, ctx, &mut trail).await {
                Ok(()) => return Ok(()),
                Err(err) => trail.unwind(stack, ctx, err),
            };
            ctx.release_response();

            let Some(retryer) = retryer else {
                return Err(err);
            };
            if err.is_canceled() || attempt >= max_attempts || !retryer.is_retryable(&err) {
                return Err(err);
            }

            let delay = retryer.retry_delay(attempt, &err);
            debug!(
                operation = ctx.operation(),
                attempt,
                next_attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Retry backoff"
            );
            if self.log_mode.is_retries() {
                info!(
                    operation = ctx.operation(),
                    attempt,
                    max_attempts,
                    error = %err,
                    "retrying request after {:?}",
                    delay
                );
            }

            self.backoff(delay).await?;
            attempt += 1;
        }
    }

    /// One pass of Serialize → Build → Finalize → send → Deserialize
    async fn attempt(
        &self,
        stack: &Stack,
        ctx: &mut Context,
        trail: &mut Trail,
    ) -> Result<(), ExecutionError> {
        for phase in [Phase::Serialize, Phase::Build, Phase::Finalize] {
            self.run_phase(stack, phase, ctx, trail)?;
        }

        self.check_cancelled()?;
        let request = ctx.request()?.clone();
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ExecutionError::Canceled),
            result = self.transport.send(request) => result?,
        };
        ctx.response = Some(response);

        self.run_phase(stack, Phase::Deserialize, ctx, trail)
    }

    /// Run every step of `phase`, each inside the innermost open span
    fn run_phase(
        &self,
        stack: &Stack,
        phase: Phase,
        ctx: &mut Context,
        trail: &mut Trail,
    ) -> Result<(), ExecutionError> {
        self.check_cancelled()?;
        for step in stack.phase(phase).iter() {
            trail.enter(phase);
            let span = ctx.current_span();
            span.in_scope(|| step.handle(ctx))?;
        }
        Ok(())
    }

    async fn backoff(&self, delay: Duration) -> Result<(), ExecutionError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ExecutionError::Canceled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn check_cancelled(&self) -> Result<(), ExecutionError> {
        if self.cancel.is_cancelled() {
            return Err(ExecutionError::Canceled);
        }
        Ok(())
    }
}

/// Steps whose `handle` was entered, as (phase, count) in run order
///
/// Only these see `handle_error` when the call fails; a step that never ran
/// has nothing to undo.
#[derive(Debug, Default)]
struct Trail {
    entered: Vec<(Phase, usize)>,
}

impl Trail {
    fn enter(&mut self, phase: Phase) {
        if let Some((last, count)) = self.entered.last_mut() {
            if *last == phase {
                *count += 1;
                return;
            }
        }
        self.entered.push((phase, 1));
    }

    /// Pass `err` back through the entered steps, last step first
    fn unwind(&self, stack: &Stack, ctx: &mut Context, err: ExecutionError) -> ExecutionError {
        self.entered.iter().rev().fold(err, |err, (phase, count)| {
            stack
                .phase(*phase)
                .iter()
                .take(*count)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .fold(err, |err, step| step.handle_error(ctx, err))
        })
    }
}
