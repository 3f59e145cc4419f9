//! Router error types.

use std::time::Duration;

use deskthing_protocol::{Channel, ProtocolError, ReservedAppId, RouteKey};
use thiserror::Error;

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors raised while building or driving a router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Two handlers registered for the same key.
    #[error("A handler is already registered for {key}")]
    DuplicateHandler { key: RouteKey },

    /// The key names a domain or request the channel never produces.
    #[error("{key} is not declared by the {channel} vocabulary")]
    UndeclaredRoute { channel: Channel, key: RouteKey },

    #[error(transparent)]
    ReservedAppId(#[from] ReservedAppId),

    /// The mailbox worker has stopped.
    #[error("Mailbox for {sender} is closed")]
    MailboxClosed { sender: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Codec error (size limit, malformed JSON).
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl RouterError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Why a handler did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Handler timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Creates a failure from any displayable error.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self::Failed(error.to_string())
    }
}
