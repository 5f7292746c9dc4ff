//! Message transport over a WebSocket connection
//!
//! Pumps [`Message`](collector_manager_core::Message) frames between a live
//! connection and the manager's queues, and reports how each session ended
//! as a [`ConnectionOutcome`].

mod websocket;

pub use websocket::{
    close, handle_traffic, open, receive, send, Connection, CLOSE_TIMEOUT,
};

use tokio_tungstenite::tungstenite;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint was unreachable or rejected the handshake
    #[error("failed to dial: {0}")]
    Dial(#[source] tungstenite::Error),

    /// A connection header could not be encoded
    #[error("invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    /// Reading a frame failed for a reason other than a close
    #[error("unknown read error: {0}")]
    Read(#[source] tungstenite::Error),

    /// A frame did not contain a valid message
    #[error("unknown read error: {0}")]
    Decode(#[source] serde_json::Error),

    /// A message could not be encoded
    #[error("unknown write error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Writing a frame failed
    #[error("unknown write error: {0}")]
    Write(#[source] tungstenite::Error),
}

/// How a connection session ended
#[derive(Debug)]
pub enum ConnectionOutcome {
    /// The outbound queue was closed and everything in it was sent
    Drained,
    /// The peer closed the connection
    GracefulClose,
    /// The session reached its maximum lifetime
    TimedOut,
    /// The session was cancelled from outside
    Cancelled,
    /// The connection failed unexpectedly
    HardError(TransportError),
}

impl ConnectionOutcome {
    /// Whether the session ended the way sessions normally end
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::HardError(_))
    }
}
