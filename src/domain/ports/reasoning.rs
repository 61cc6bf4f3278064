//! Reasoning service port - interface for the conversation backend.

use async_trait::async_trait;

use crate::domain::errors::ReasoningError;
use crate::domain::models::Turn;

/// The external capability that, given a conversation, produces the next turn.
///
/// The controller treats the reply as opaque free text; control signals are
/// extracted afterwards by its own sentinel parser. Implementations handle
/// their own transport retries - by the time an error escapes this trait it is
/// final and the session aborts.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    /// Produce the next assistant turn for the given instruction text and
    /// ordered transcript window.
    ///
    /// This is a blocking request/response operation with no partial results.
    async fn next_turn(
        &self,
        instructions: &str,
        transcript: &[Turn],
    ) -> Result<String, ReasoningError>;
}
