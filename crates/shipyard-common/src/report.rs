//! Per-step error collection for best-effort sequences.
//!
//! Cgroup fan-outs and workspace teardown attempt every step even when an
//! earlier one fails. A [`StepReport`] records which steps failed so the
//! caller can log, aggregate, or ignore them.

use std::fmt;

use crate::error::{Result, ShipyardError};

/// A single failed step.
#[derive(Debug)]
pub struct StepFailure {
    /// Name of the step, e.g. a controller name or teardown phase.
    pub step: String,
    /// Error the step produced.
    pub error: ShipyardError,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.error)
    }
}

/// Outcome of a best-effort sequence.
#[derive(Debug, Default)]
pub struct StepReport {
    failures: Vec<StepFailure>,
}

impl StepReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result of one step, logging it if it failed.
    ///
    /// Returns `true` when the step succeeded.
    pub fn record(&mut self, step: impl Into<String>, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(error) => {
                let step = step.into();
                tracing::warn!(step = %step, error = %error, "step failed, continuing");
                self.failures.push(StepFailure { step, error });
                false
            }
        }
    }

    /// Appends every failure of `other` to this report.
    pub fn merge(&mut self, other: Self) {
        self.failures.extend(other.failures);
    }

    /// Returns `true` when no step failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the recorded failures in the order they happened.
    #[must_use]
    pub fn failures(&self) -> &[StepFailure] {
        &self.failures
    }

    /// Names of the failed steps.
    #[must_use]
    pub fn failed_steps(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.step.as_str()).collect()
    }

    /// Collapses the report into a single result.
    ///
    /// # Errors
    ///
    /// Returns [`ShipyardError::Partial`] describing every failure when at
    /// least one step failed.
    pub fn into_result(self) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        let summary = self
            .failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(ShipyardError::Partial {
            failed: self.failures.len(),
            summary,
        })
    }
}
