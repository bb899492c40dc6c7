//! Error types for the Reveri client.

use thiserror::Error;

/// Errors that can occur when using the Reveri client.
#[derive(Debug, Error)]
pub enum ReveriError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An inbound frame was not a valid envelope, or its payload did not
    /// match the shape expected for its message kind.
    #[error("malformed frame: {reason}")]
    MalformedFrame {
        /// What was wrong with the frame.
        reason: String,
    },

    /// Attempted to send a command while no connection is open.
    #[error("not connected to server")]
    NotConnected,

    /// A connection attempt or shutdown did not finish in time.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Reveri client operations.
pub type Result<T> = std::result::Result<T, ReveriError>;
