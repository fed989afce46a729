//! Error types for jsonrpc-wire.

use thiserror::Error;

/// Main error type for all client, server, and transport operations.
#[derive(Debug, Error)]
pub enum RpcError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be serialized to JSON.
    #[error("encoding error: {0}")]
    Encode(serde_json::Error),

    /// Malformed JSON inside a complete frame. Distinct from "insufficient
    /// data", which is not an error at all.
    #[error("decoding error: {0}")]
    Decode(serde_json::Error),

    /// Wire protocol violation (e.g., declared frame length over the limit).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A request's timer elapsed before a response was matched to it.
    #[error("Request Timed Out")]
    RequestTimedOut,

    /// The stop-buffering threshold was exceeded while disconnected.
    #[error("Connection Unavailable")]
    ConnectionUnavailable,

    /// The transport was shut down before this request could resolve,
    /// or a request was issued after shutdown.
    #[error("transport closed")]
    TransportClosed,

    /// The peer answered with a JSON-RPC error envelope.
    #[error("{message}")]
    Remote {
        /// JSON-RPC error code (see the [`crate::protocol`] constants).
        code: i32,
        /// Human-readable message from the error envelope.
        message: String,
    },

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RpcError {
    /// The JSON-RPC error code, for protocol-level errors.
    pub fn code(&self) -> Option<i32> {
        match self {
            RpcError::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;
