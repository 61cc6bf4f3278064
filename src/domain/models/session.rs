//! Session state: the single mutable record threaded through every phase.
//!
//! One `SessionState` exists per conversation and is owned exclusively by the
//! phase controller for its lifetime. All mutations are synchronous and total;
//! mutating a terminal session is a programmer error and panics rather than
//! returning a recoverable error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::outcome::ExecutionReport;

/// Phase of the conversation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Gathering requirements from the user.
    Planning,
    /// Asking the reasoning service for a code unit.
    Generation,
    /// Executing the extracted code unit and reviewing the result.
    Testing,
    /// Terminal: an approved, passing code unit was delivered.
    Complete,
    /// Terminal: the iteration budget ran out; a human has to step in.
    Failed,
}

impl Phase {
    /// Whether this is a terminal phase (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Planning => "planning",
            Self::Generation => "generation",
            Self::Testing => "testing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Who authored a transcript turn.
///
/// Harness-generated context (test diagnostics, re-prompt nudges) is replayed
/// with the `User` role so the reasoning service responds to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human user, or harness-injected context spoken on their behalf.
    User,
    /// The reasoning service.
    Assistant,
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Author of the turn.
    pub role: Role,
    /// Verbatim content; replayed unmodified to the reasoning service.
    pub content: String,
    /// When the turn was appended.
    pub at: DateTime<Utc>,
}

impl Turn {
    /// Create a user turn stamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            at: Utc::now(),
        }
    }

    /// Create an assistant turn stamped now.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            at: Utc::now(),
        }
    }
}

/// Mutable state of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    id: Uuid,
    phase: Phase,
    transcript: Vec<Turn>,
    requirements: BTreeMap<String, String>,
    generated_code: Option<String>,
    test_result: Option<ExecutionReport>,
    iteration_count: u32,
    created_at: DateTime<Utc>,
}

impl SessionState {
    /// Create an empty session in the `Planning` phase.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: Phase::Planning,
            transcript: Vec::new(),
            requirements: BTreeMap::new(),
            generated_code: None,
            test_result: None,
            iteration_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Unique session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Full conversation in insertion order.
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// The last `n` turns, for bounded replay to the reasoning service.
    pub fn transcript_tail(&self, n: usize) -> &[Turn] {
        let start = self.transcript.len().saturating_sub(n);
        &self.transcript[start..]
    }

    /// Requirements accumulated during planning.
    pub fn requirements(&self) -> &BTreeMap<String, String> {
        &self.requirements
    }

    /// Most recently extracted code unit.
    pub fn generated_code(&self) -> Option<&str> {
        self.generated_code.as_deref()
    }

    /// Most recent execution result.
    pub fn test_result(&self) -> Option<&ExecutionReport> {
        self.test_result.as_ref()
    }

    /// Number of testing iterations spent so far.
    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// When the session was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append a turn to the transcript. Insertion order is conversation order.
    pub fn append_turn(&mut self, turn: Turn) {
        self.assert_live("append_turn");
        self.transcript.push(turn);
    }

    /// Add or overwrite a requirement. Requirements are never deleted.
    pub fn set_requirement(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.assert_live("set_requirement");
        self.requirements.insert(key.into(), value.into());
    }

    /// Replace the current code unit. Replaced wholesale, never merged.
    pub fn set_generated_code(&mut self, code: impl Into<String>) {
        self.assert_live("set_generated_code");
        self.generated_code = Some(code.into());
    }

    /// Replace the current test result. Replaced wholesale, never merged.
    pub fn set_test_result(&mut self, report: ExecutionReport) {
        self.assert_live("set_test_result");
        self.test_result = Some(report);
    }

    /// Move to the next phase. Panics when called on a terminal session.
    pub fn advance_phase(&mut self, next: Phase) {
        self.assert_live("advance_phase");
        tracing::debug!(session_id = %self.id, from = %self.phase, to = %next, "phase transition");
        self.phase = next;
    }

    /// Count one testing attempt. Incremented exactly once per executor
    /// invocation; extraction misses never touch it.
    pub fn increment_iteration(&mut self) {
        self.assert_live("increment_iteration");
        self.iteration_count += 1;
    }

    fn assert_live(&self, op: &str) {
        assert!(
            !self.phase.is_terminal(),
            "{op} on terminal session {} (phase {})",
            self.id,
            self.phase,
        );
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
