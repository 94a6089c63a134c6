//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding worker output or encoding requests
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Line does not follow the handshake layout
    #[error("Invalid handshake: {0:?}")]
    InvalidHandshake(String),

    /// Address segment of the handshake is not an IP literal
    #[error("Invalid address in handshake: {0:?}")]
    InvalidAddress(String),

    /// Port segment of the handshake is not a valid port
    #[error("Invalid port in handshake: {0:?}")]
    InvalidPort(String),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
