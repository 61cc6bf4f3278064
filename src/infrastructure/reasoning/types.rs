//! Request and response types for the messages endpoint.

use serde::{Deserialize, Serialize};

/// Message request sent to the reasoning service.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    /// Model identifier.
    pub model: String,

    /// Ordered conversation.
    pub messages: Vec<Message>,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Instruction text for this phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// `user` or `assistant`.
    pub role: String,

    /// Plain text content.
    pub content: String,
}

/// Message response from the reasoning service.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    /// Content blocks; text blocks are concatenated into the reply.
    pub content: Vec<ContentBlock>,
}

/// One content block of a response.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    /// Block type; only `text` blocks carry reply content.
    #[serde(rename = "type")]
    pub block_type: String,

    /// Text payload for `text` blocks.
    #[serde(default)]
    pub text: String,
}

impl MessageResponse {
    /// Concatenate the text blocks into the single assistant turn.
    pub fn into_text(self) -> String {
        self.content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("")
    }
}
