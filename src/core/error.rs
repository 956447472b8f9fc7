use thiserror::Error;

/// Errors raised by the session relay core.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A session with the requested id is already registered.
    #[error("Session {0} already exists")]
    DuplicateSession(String),

    /// No session is registered under the id.
    #[error("Session {0} not found")]
    SessionNotFound(String),

    /// The pipeline refused or failed to start a session.
    #[error("Failed to start session {session_id}: {reason}")]
    SessionStart { session_id: String, reason: String },

    /// Send or receive fault on the transport.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
