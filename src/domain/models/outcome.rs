//! Execution and session outcome records.

use serde::{Deserialize, Serialize};

use super::session::Turn;

/// Fixed marker printed with a failed session so downstream tooling can grep
/// for conversations that need a human.
pub const MANUAL_INTERVENTION_MARKER: &str = "MANUAL_INTERVENTION_REQUIRED";

/// How a sandboxed run of a code unit ended.
///
/// The taxonomy deliberately separates "ran and failed" (`Exited` with a
/// non-zero code) from "did not finish" (`TimedOut`, `Cancelled`): the fix the
/// model should attempt differs (infinite loop vs. logic bug), so the
/// controller words its feedback differently per variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProcessOutcome {
    /// The process ran to completion with the given exit code.
    Exited {
        /// Raw exit code; 0 means success.
        code: i32,
    },
    /// The wall-clock budget elapsed and the process group was killed.
    TimedOut,
    /// The session was cancelled mid-run and the process group was killed.
    Cancelled,
    /// Nothing was spawned: the code unit was empty.
    NothingToRun,
}

impl ProcessOutcome {
    /// True only for a clean zero exit.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited { code: 0 })
    }
}

/// Result record of one sandboxed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// True iff the process exited zero within the time budget.
    pub succeeded: bool,

    /// Disposition of the process.
    pub outcome: ProcessOutcome,

    /// Captured standard output, up to the per-stream byte cap.
    pub stdout: String,

    /// Captured standard error, up to the per-stream byte cap.
    pub stderr: String,

    /// True if either stream exceeded the byte cap and was cut off.
    pub truncated: bool,

    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl ExecutionReport {
    /// Report for an empty code unit, which is treated as an execution
    /// failure without spawning anything.
    pub fn nothing_to_run() -> Self {
        Self {
            succeeded: false,
            outcome: ProcessOutcome::NothingToRun,
            stdout: String::new(),
            stderr: String::new(),
            truncated: false,
            duration_ms: 0,
        }
    }
}

/// Final deliverable of a session, exposed once a terminal phase is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SessionOutcome {
    /// The generated code passed its sandbox run and the reviewer approved it.
    Delivered {
        /// The approved code unit.
        code: String,
        /// The passing test result.
        test: ExecutionReport,
    },

    /// The iteration budget ran out (or the session was cancelled) before an
    /// approved, passing run was produced.
    ManualInterventionRequired {
        /// Tail of the conversation for human triage.
        transcript_tail: Vec<Turn>,
        /// Last captured test result, if any execution happened at all.
        last_test: Option<ExecutionReport>,
        /// Number of testing iterations spent.
        iterations: u32,
    },
}
