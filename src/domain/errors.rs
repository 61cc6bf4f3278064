//! Error taxonomy for the hepcode session loop.
//!
//! Two families of failure exist and must never be conflated: infrastructure
//! faults (the reasoning service is unreachable, the sandbox cannot stage or
//! spawn a process) abort the session with a `SessionError`; code-quality
//! failures (non-zero exits, timeouts, extraction misses) are recoverable and
//! routed back through the Generation phase until the iteration budget runs
//! out, at which point the session ends in the `Failed` phase instead.

use thiserror::Error;

/// Errors from the reasoning service transport.
#[derive(Debug, Error)]
pub enum ReasoningError {
    /// Invalid request parameters or malformed request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication failed due to invalid or missing API key.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limit exceeded, retry after waiting.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Service encountered an internal error.
    #[error("service error: {0}")]
    ServerError(String),

    /// Service is overloaded, retry later.
    #[error("service overloaded")]
    Overloaded,

    /// Network error occurred during request.
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out waiting for a reply.
    #[error("timeout waiting for reply")]
    Timeout,

    /// The reply could not be decoded into a single assistant turn.
    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

impl ReasoningError {
    /// Returns true if this error is transient and worth retrying.
    ///
    /// Transient: rate limits, 5xx-class server errors, overload, timeouts,
    /// and network failures. Permanent: bad requests, bad credentials, and
    /// undecodable replies.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded
                | Self::ServerError(_)
                | Self::Overloaded
                | Self::Network(_)
                | Self::Timeout
        )
    }
}

/// Infrastructure faults inside the sandboxed executor.
///
/// These are distinct from execution *failures* (non-zero exit, timeout),
/// which are reported through `ExecutionReport` and remain recoverable.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Could not create the sandbox directory or stage the code unit.
    #[error("failed to stage code unit: {0}")]
    Stage(#[source] std::io::Error),

    /// Could not spawn the interpreter process.
    #[error("failed to spawn interpreter {command:?}: {source}")]
    Spawn {
        /// Interpreter command that failed to start.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Could not reap the child process.
    #[error("failed to wait for child process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Fatal session faults, surfaced to the caller instead of a `Failed` phase.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The reasoning service stayed unreachable after bounded retries.
    #[error("reasoning service unavailable: {0}")]
    Reasoning(#[from] ReasoningError),

    /// The sandbox could not stage or spawn an execution at all.
    #[error("sandbox fault: {0}")]
    Sandbox(#[from] SandboxError),
}

/// Result alias for controller-facing operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ReasoningError::RateLimitExceeded.is_transient());
        assert!(ReasoningError::Overloaded.is_transient());
        assert!(ReasoningError::Timeout.is_transient());
        assert!(ReasoningError::ServerError("boom".into()).is_transient());
        assert!(ReasoningError::Network("reset".into()).is_transient());
    }

    #[test]
    fn test_permanent_classification() {
        assert!(!ReasoningError::InvalidRequest("bad".into()).is_transient());
        assert!(!ReasoningError::AuthenticationFailed("key".into()).is_transient());
        assert!(!ReasoningError::MalformedReply("empty".into()).is_transient());
    }
}
