//! JSON encoding of envelopes with a size limit.
//!
//! Transports deliver whole messages; this module only bounds and parses
//! them.

use crate::envelope::RawEnvelope;
use crate::error::{ProtocolError, ProtocolResult};

/// Encodes an envelope to JSON bytes.
///
/// # Example
///
/// ```rust
/// use deskthing_protocol::{encode_envelope, RawEnvelope, MAX_MESSAGE_SIZE};
///
/// let envelope = RawEnvelope::to_client("ping");
/// let bytes = encode_envelope(&envelope, MAX_MESSAGE_SIZE).unwrap();
/// assert!(bytes.starts_with(b"{"));
/// ```
pub fn encode_envelope(envelope: &RawEnvelope, max: usize) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(envelope)?;
    if json.len() > max {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max,
        });
    }
    Ok(json)
}

/// Decodes a single envelope from JSON bytes.
///
/// Leading and trailing whitespace is ignored.
///
/// # Example
///
/// ```rust
/// use deskthing_protocol::{decode_envelope, MAX_MESSAGE_SIZE};
///
/// let raw = decode_envelope(br#"{"type":"ping","app":"client"}"#, MAX_MESSAGE_SIZE).unwrap();
/// assert_eq!(raw.domain, "ping");
/// ```
pub fn decode_envelope(data: &[u8], max: usize) -> ProtocolResult<RawEnvelope> {
    if data.len() > max {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max,
        });
    }

    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(ProtocolError::EmptyMessage);
    }

    let envelope = serde_json::from_slice(data)?;
    Ok(envelope)
}
