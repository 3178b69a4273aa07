//! Attempts and the refinement trace
//!
//! Every sandbox execution inside a refinement loop produces one Attempt.
//! Attempts are immutable once recorded; the trace only ever grows.

use serde::{Deserialize, Serialize};

/// Whether an attempt's execution succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// One iteration's candidate code plus its execution outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    iteration: u32,
    code: String,
    stdout: String,
    stderr: String,
    exit_status: i32,
    outcome: AttemptOutcome,
}

impl Attempt {
    /// Record an execution; the outcome follows from the exit status
    pub fn new(iteration: u32, code: impl Into<String>, stdout: impl Into<String>, stderr: impl Into<String>, exit_status: i32) -> Self {
        let outcome = if exit_status == 0 {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::Failure
        };
        Self {
            iteration,
            code: code.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status,
            outcome,
        }
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    pub fn outcome(&self) -> AttemptOutcome {
        self.outcome
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

/// Ordered, append-only sequence of attempts for one artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementTrace {
    attempts: Vec<Attempt>,
}

impl RefinementTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt. Iterations must be recorded in order.
    pub(crate) fn record(&mut self, attempt: Attempt) {
        debug_assert_eq!(attempt.iteration() as usize, self.attempts.len());
        self.attempts.push(attempt);
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn last(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// True when the final attempt succeeded
    pub fn succeeded(&self) -> bool {
        self.last().is_some_and(Attempt::is_success)
    }
}
