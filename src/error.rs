//! Error types for Chat Assist.

use std::time::Duration;

/// Chat-transport errors. Lookup failures are treated as "unknown" by the
/// router (filters stay permissive); send failures abandon the reply attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is not connected")]
    NotConnected,

    #[error("Failed to send to {recipient}: {reason}")]
    SendFailed { recipient: String, reason: String },

    #[error("Metadata lookup ({what}) failed for {id}: {reason}")]
    LookupFailed {
        what: String,
        id: String,
        reason: String,
    },

    #[error("Authentication failed: {reason}")]
    AuthFailed { reason: String },
}

/// Completion-service errors. Terminal for the current message — the caller
/// sends nothing and does not retry.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")]
    RequestFailed(String),

    #[error("Completion service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Completion timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Invalid completion response: {0}")]
    InvalidResponse(String),
}

/// Persistence errors. In-memory state stays authoritative until the next
/// successful save.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
