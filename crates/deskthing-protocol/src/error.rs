//! Protocol error types.

use thiserror::Error;

use crate::envelope::Channel;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message exceeds maximum allowed size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Empty message received.
    #[error("empty message")]
    EmptyMessage,

    /// Failed to (de)serialize the envelope JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The envelope does not match its channel's schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Why an envelope was not accepted by a channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// `type` is not declared for the channel.
    #[error("unknown domain '{domain}' on {channel}")]
    UnknownDomain { channel: Channel, domain: String },

    /// `type` is known but `request` is not valid for it.
    #[error("unknown request {request:?} for domain '{domain}' on {channel}")]
    UnknownRequest {
        channel: Channel,
        domain: String,
        request: Option<String>,
    },

    /// The pair is known but the payload has the wrong structure.
    #[error("payload for {domain}/{} does not match: {reason}", .request.as_deref().unwrap_or("*"))]
    PayloadShapeMismatch {
        domain: String,
        request: Option<String>,
        reason: String,
    },

    /// The variant requires a `clientId` and none was given.
    #[error("{domain}/{request} requires a clientId")]
    MissingCorrelationId { domain: String, request: String },

    /// A legacy envelope has no canonical form.
    #[error("legacy '{domain}' envelope could not be upgraded: {reason}")]
    LegacyUpgradeFailure { domain: String, reason: String },
}

/// Discriminant of [`SchemaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaErrorKind {
    UnknownDomain,
    UnknownRequest,
    PayloadShapeMismatch,
    MissingCorrelationId,
    LegacyUpgradeFailure,
}

impl SchemaErrorKind {
    /// Returns a human-readable description of the error kind.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownDomain => "The message type is not known to this endpoint",
            Self::UnknownRequest => "The request is not known for this message type",
            Self::PayloadShapeMismatch => "The payload does not have the declared shape",
            Self::MissingCorrelationId => "The message must carry a client id",
            Self::LegacyUpgradeFailure => "A legacy message could not be upgraded",
        }
    }
}

impl SchemaError {
    pub fn kind(&self) -> SchemaErrorKind {
        match self {
            Self::UnknownDomain { .. } => SchemaErrorKind::UnknownDomain,
            Self::UnknownRequest { .. } => SchemaErrorKind::UnknownRequest,
            Self::PayloadShapeMismatch { .. } => SchemaErrorKind::PayloadShapeMismatch,
            Self::MissingCorrelationId { .. } => SchemaErrorKind::MissingCorrelationId,
            Self::LegacyUpgradeFailure { .. } => SchemaErrorKind::LegacyUpgradeFailure,
        }
    }

    /// True when the error points at endpoints speaking different protocol
    /// versions rather than at a caller bug.
    pub fn is_version_skew(&self) -> bool {
        matches!(
            self,
            Self::UnknownDomain { .. } | Self::UnknownRequest { .. }
        )
    }

    pub(crate) fn shape(
        domain: &str,
        request: Option<&str>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::PayloadShapeMismatch {
            domain: domain.to_string(),
            request: request.map(str::to_string),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn legacy(domain: &str, reason: impl std::fmt::Display) -> Self {
        Self::LegacyUpgradeFailure {
            domain: domain.to_string(),
            reason: reason.to_string(),
        }
    }
}
