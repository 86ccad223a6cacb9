use std::time::Duration;

/// Errors that can occur in session, command, and discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] iscp_transport::TransportError),

    /// Frame-level error, including a closed connection and a desynchronized
    /// eISCP stream.
    #[error("frame error: {0}")]
    Frame(#[from] iscp_frame::FrameError),

    /// The phrase has no mapping and is not already a wire code.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// A command table entry is not a usable wire code.
    #[error("invalid command table: {0}")]
    InvalidCommandTable(String),

    /// No receiver answered the discovery broadcast.
    #[error("no receiver answered discovery within {0:?}")]
    DiscoveryTimeout(Duration),

    /// A discovery reply could not be interpreted.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Socket I/O outside the session transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Whether the transport reported end-of-stream.
    pub fn is_connection_closed(&self) -> bool {
        matches!(
            self,
            Self::Frame(iscp_frame::FrameError::ConnectionClosed)
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
