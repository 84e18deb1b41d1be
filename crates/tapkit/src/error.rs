//! Harness error taxonomy.
//!
//! Assertion failures are never errors: they are folded into the counters and
//! reported as `not ok` lines. Everything in [`TapError`] means the harness
//! itself can no longer produce a trustworthy run.

use thiserror::Error;

/// Exit status used for every fatal harness error.
pub const TAP_FAILURE_EXIT_STATUS: u8 = 255;

#[derive(Debug, Error)]
pub enum TapError {
    #[error("plan was called twice")]
    PlanTwice,
    #[error("no tests planned")]
    EmptyPlan,
    #[error("fork: {0}")]
    Fork(#[source] std::io::Error),
    #[error("waitpid: {0}")]
    Wait(#[source] std::io::Error),
    #[error("mmap: {0}")]
    SharedMap(#[source] std::io::Error),
    #[error("{0}")]
    Bail(String),
    #[error("event log: {0}")]
    Log(#[source] std::io::Error),
}

impl TapError {
    /// Whether this error aborts the run in the middle of testing.
    ///
    /// An explicit bail-out is a deliberate stop, so reconciliation still
    /// compares the plan against what ran instead of reporting a death.
    #[must_use]
    pub fn marks_run_dead(&self) -> bool {
        !matches!(self, Self::Bail(_))
    }
}
