//! Test-run state machine.
//!
//! [`TestState`] holds the plan, the counters and the TODO block. It does no
//! I/O: the runtime context owns the lock and the output sink and asks the
//! state what to write.

use serde::Serialize;

use crate::error::{TAP_FAILURE_EXIT_STATUS, TapError};
use crate::format::tests_noun;

/// Counters and plan of one test run.
#[derive(Debug, Default)]
pub struct TestState {
    has_plan: bool,
    planned: u32,
    ran: u32,
    failed: u32,
    todo: Option<String>,
    owner_pid: Option<u32>,
    died: bool,
    finalized: bool,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub planned: Option<u32>,
    pub ran: u32,
    pub failed: u32,
    pub passed: u32,
    pub in_todo: bool,
    pub died: bool,
}

impl TestState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the expected number of assertions.
    ///
    /// The first call records `pid` as the owner of the run, even when the
    /// plan itself is rejected. Rejections mark the run as died.
    pub fn declare_plan(&mut self, planned: u32, pid: u32) -> Result<(), TapError> {
        self.owner_pid.get_or_insert(pid);

        if self.has_plan {
            self.died = true;
            return Err(TapError::PlanTwice);
        }
        if planned == 0 {
            self.died = true;
            return Err(TapError::EmptyPlan);
        }

        self.has_plan = true;
        self.planned = planned;
        Ok(())
    }

    /// Count one assertion and return its sequence number.
    pub fn record(&mut self, passed: bool) -> u32 {
        self.ran = self.ran.saturating_add(1);
        if !passed {
            self.failed = self.failed.saturating_add(1);
        }
        self.ran
    }

    /// Count `count` skipped assertions and return the first sequence number.
    pub fn skip(&mut self, count: u32) -> u32 {
        let first = self.ran.saturating_add(1);
        self.ran = self.ran.saturating_add(count);
        first
    }

    pub fn begin_todo(&mut self, message: String) {
        self.todo = Some(message);
    }

    pub fn end_todo(&mut self) {
        self.todo = None;
    }

    #[must_use]
    pub fn todo(&self) -> Option<&str> {
        self.todo.as_deref()
    }

    pub fn mark_died(&mut self) {
        self.died = true;
    }

    #[must_use]
    pub fn has_plan(&self) -> bool {
        self.has_plan
    }

    #[must_use]
    pub fn ran(&self) -> u32 {
        self.ran
    }

    /// Exit code for the run, in `[0, 255]`.
    ///
    /// Running more tests than planned yields the overrun; otherwise every
    /// failure and every planned test that never ran counts one unit.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        let code = if self.planned < self.ran {
            self.ran - self.planned
        } else {
            self.failed.saturating_add(self.planned - self.ran)
        };
        u8::try_from(code).unwrap_or(TAP_FAILURE_EXIT_STATUS)
    }

    /// End-of-run diagnostics.
    ///
    /// Returns `None` when reconciliation already happened or when `pid` is
    /// not the process that owns the run.
    pub fn reconcile(&mut self, pid: u32) -> Option<Vec<String>> {
        if self.finalized {
            return None;
        }
        if self.owner_pid.is_some_and(|owner| owner != pid) {
            return None;
        }
        self.finalized = true;

        if !self.has_plan {
            return Some(vec![
                "Test died before any output could be written".to_owned(),
            ]);
        }
        if self.died {
            return Some(vec![format!("Test died after test {}", self.ran)]);
        }

        let mut lines = Vec::new();
        if self.planned != self.ran {
            lines.push(format!(
                "Planned {} {} but ran {}",
                self.planned,
                tests_noun(self.planned),
                self.ran
            ));
        }
        if self.failed > 0 {
            lines.push(format!("Failed {} tests of {}", self.failed, self.ran));
        }
        Some(lines)
    }

    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary {
            planned: self.has_plan.then_some(self.planned),
            ran: self.ran,
            failed: self.failed,
            passed: self.ran - self.failed,
            in_todo: self.todo.is_some(),
            died: self.died,
        }
    }
}
