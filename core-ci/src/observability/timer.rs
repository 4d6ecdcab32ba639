//! Per-step timing.

use crate::core::StepKind;
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument, Span};

/// Times one runner step and logs its outcome inside the step's span.
#[derive(Debug)]
pub struct StepTimer {
    step: StepKind,
    span: Span,
    start: Instant,
}

impl StepTimer {
    /// Opens the step's span and starts timing.
    #[must_use]
    pub fn start(step: StepKind) -> Self {
        let span = info_span!("step", step = %step);
        span.in_scope(|| info!("Step started"));
        Self {
            step,
            span,
            start: Instant::now(),
        }
    }

    /// Returns the step being timed.
    #[must_use]
    pub fn step(&self) -> StepKind {
        self.step
    }

    /// Returns the step's span.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Awaits `future` inside the step's span and logs a failure.
    pub async fn instrument<F, T, E>(&self, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let result = future.instrument(self.span.clone()).await;
        self.check(result)
    }

    /// Logs a failure without ending the step.
    pub fn check<T, E: Display>(&self, result: Result<T, E>) -> Result<T, E> {
        if let Err(err) = &result {
            self.span.in_scope(|| {
                error!(duration_ms = self.elapsed_ms(), error = %err, "Step failed");
            });
        }
        result
    }

    /// Logs completion and returns the duration.
    pub fn finish(self) -> f64 {
        let duration_ms = self.elapsed_ms();
        self.span.in_scope(|| info!(duration_ms, "Step finished"));
        duration_ms
    }

    /// Logs the outcome of `result`, ending the step on success.
    pub fn track<T, E: Display>(self, result: Result<T, E>) -> Result<T, E> {
        let result = self.check(result);
        if result.is_ok() {
            self.finish();
        }
        result
    }
}
