//! Error types for a3s-agent-stream

use thiserror::Error;

/// Errors that can occur while submitting or consuming an agent turn
#[derive(Debug, Error)]
pub enum StreamError {
    /// Transport connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Turn submission failure
    #[error("Failed to invoke agent '{agent_id}': {reason}")]
    Invoke {
        agent_id: String,
        reason: String,
    },

    /// Service-level exception reported by the agent runtime
    ///
    /// `code` is the raw exception name (e.g. `throttlingException`).
    #[error("Service exception ({code}): {message}")]
    Service {
        code: String,
        message: String,
    },

    /// Non-success HTTP response without a typed exception name
    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
    },

    /// The event byte stream broke mid-turn
    #[error("Stream error: {0}")]
    Stream(String),

    /// A frame that is neither a trace nor a chunk envelope
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object store failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl StreamError {
    /// Whether this error only affects a single frame
    ///
    /// Malformed frames are skipped by the turn driver; every other
    /// in-stream error ends the turn.
    pub fn is_malformed_event(&self) -> bool {
        matches!(self, StreamError::MalformedEvent(_))
    }
}

/// Result type alias for agent stream operations
pub type Result<T> = std::result::Result<T, StreamError>;
