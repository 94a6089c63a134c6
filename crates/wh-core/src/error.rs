//! Core error types for workerhost

use std::path::PathBuf;

use thiserror::Error;
use wh_protocol::ProtocolError;

/// Result type returned by the invocation entry points
pub type Result<T> = std::result::Result<T, HostError>;

/// Top-level error type for invocations
#[derive(Error, Debug)]
pub enum HostError {
    /// The worker ran the invocation and reported a failure
    #[error("{message}")]
    Invocation {
        /// Remote error message
        message: String,
        /// Remote stack trace, empty when the worker sent none
        stack: String,
    },

    /// The per-call deadline fired while a worker existed
    #[error(
        "The invocation timed out after {timeout_ms}ms. The timeout can be changed with the \
         `timeout_ms` option of `HostOptions`. Worker-side code must always signal completion, \
         both on success and on failure, otherwise the invocation can only ever time out."
    )]
    Timeout {
        /// Configured timeout
        timeout_ms: i64,
    },

    /// The worker could not be reached or never announced its endpoint
    #[error("Connection to the worker timed out: {0}")]
    ConnectionTimeout(String),

    /// The caller cancelled the invocation
    #[error("Invocation cancelled")]
    Cancelled,

    /// The worker answered with a status outside success/not-found/server-error
    #[error("Unexpected response status from worker: {0}")]
    UnexpectedStatus(u16),

    /// The host has been disposed
    #[error("Worker host has been disposed")]
    Disposed,

    /// The worker process could not be spawned
    #[error("Failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker script could not be read
    #[error("Failed to read resource {identifier:?}: {source}")]
    Resource {
        identifier: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Success body could not be decoded as the requested type
    #[error("Failed to decode worker response: {0}")]
    Decode(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl HostError {
    /// Build an invocation error from the remote message and stack
    pub fn invocation(message: impl Into<String>, stack: Option<String>) -> Self {
        HostError::Invocation {
            message: message.into(),
            stack: stack.unwrap_or_default(),
        }
    }

    /// Whether another attempt may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HostError::Timeout { .. } | HostError::ConnectionTimeout(_) | HostError::Transport(_)
        )
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
