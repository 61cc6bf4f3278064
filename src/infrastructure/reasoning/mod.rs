//! Reasoning service implementations.

pub mod client;
pub mod retry;
pub mod scripted;
pub mod types;

pub use client::AnthropicClient;
pub use retry::RetryPolicy;
pub use scripted::{ScriptedReasoning, ScriptedReply};
