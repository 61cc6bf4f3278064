//! Scripted reasoning service for tests and offline runs.
//!
//! Pops canned replies in order; each call also records the instruction text
//! and transcript length it saw, so tests can assert what was replayed.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::ReasoningError;
use crate::domain::models::Turn;
use crate::domain::ports::ReasoningService;

/// One canned step of a script.
#[derive(Debug)]
pub enum ScriptedReply {
    /// Return this text as the assistant turn.
    Text(String),
    /// Fail with this transport error.
    Error(ReasoningError),
}

impl From<&str> for ScriptedReply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Record of one call the scripted service received.
#[derive(Debug, Clone)]
pub struct SeenCall {
    /// Instruction text of the call.
    pub instructions: String,
    /// Number of transcript turns replayed.
    pub transcript_len: usize,
    /// Content of the last replayed turn, if any.
    pub last_turn: Option<String>,
}

/// Deterministic reasoning service driven by a fixed reply script.
#[derive(Debug, Default)]
pub struct ScriptedReasoning {
    replies: Mutex<VecDeque<ScriptedReply>>,
    seen: Mutex<Vec<SeenCall>>,
}

impl ScriptedReasoning {
    /// Build a service from replies served in order.
    pub fn with_replies<I, R>(replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ScriptedReply>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Append one reply to the script.
    pub fn push(&self, reply: impl Into<ScriptedReply>) {
        self.replies.lock().expect("script lock").push_back(reply.into());
    }

    /// Calls observed so far.
    pub fn seen(&self) -> Vec<SeenCall> {
        self.seen.lock().expect("seen lock").clone()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().expect("script lock").len()
    }
}

impl From<String> for ScriptedReply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<ReasoningError> for ScriptedReply {
    fn from(err: ReasoningError) -> Self {
        Self::Error(err)
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoning {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn next_turn(
        &self,
        instructions: &str,
        transcript: &[Turn],
    ) -> Result<String, ReasoningError> {
        self.seen.lock().expect("seen lock").push(SeenCall {
            instructions: instructions.to_string(),
            transcript_len: transcript.len(),
            last_turn: transcript.last().map(|t| t.content.clone()),
        });

        match self.replies.lock().expect("script lock").pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Error(err)) => Err(err),
            None => Err(ReasoningError::MalformedReply(
                "script exhausted".to_string(),
            )),
        }
    }
}
