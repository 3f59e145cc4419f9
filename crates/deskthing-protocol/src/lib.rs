//! Envelope, channel vocabularies and typed messages for DeskThing.
//!
//! Four channels carry JSON envelopes between the host, third-party apps
//! and clients. Each channel has a closed vocabulary of domains and
//! requests; [`validate`] resolves a raw envelope against it and produces a
//! [`TypedEnvelope`] carrying the exact message variant.
//!
//! # Envelope Structure
//!
//! Every message is a JSON object with:
//! - `type`: the domain
//! - `request`: optional sub-request inside the domain
//! - `payload`: request-specific body
//! - `app` / `source`: target and origin
//! - `version`: sender protocol version
//! - `clientId`: correlation id for client-bound traffic
//!
//! Envelopes from senders older than [`PROFILES_SINCE`] are upgraded to the
//! current shapes before validation.
//!
//! # Example
//!
//! ```rust
//! use deskthing_protocol::{AppMessage, RawEnvelope, decode_envelope, validate, MAX_MESSAGE_SIZE};
//!
//! let raw = decode_envelope(
//!     br#"{"type":"task","request":"add","source":"todo","payload":{"task":{"id":"t1","steps":{}}}}"#,
//!     MAX_MESSAGE_SIZE,
//! )
//! .unwrap();
//! let typed = validate::<AppMessage>(raw).unwrap();
//! assert_eq!(typed.route.to_string(), "app:task/add");
//! ```

pub mod channels;
mod codec;
mod envelope;
mod error;
mod schema;
mod upgrade;

pub use channels::{AppEvent, AppMessage, ClientMessage, DeviceMessage, MusicEvent};
pub use codec::{decode_envelope, encode_envelope};
pub use envelope::{
    AppId, CLIENT_ID, Channel, EnvelopeMeta, MUSIC_ID, RawEnvelope, ReservedAppId, RouteKey,
    SERVER_ID, Scope, TypedEnvelope,
};
pub use error::{ProtocolError, ProtocolResult, SchemaError, SchemaErrorKind};
pub use schema::{
    DomainSpec, IdList, Message, Requests, Vocabulary, payload, require_client_id, resolve_route,
    string_or_vec, validate,
};
pub use upgrade::{
    DEFAULT_PROFILE_ID, PROFILES_SINCE, parse_version, predates_profiles, upgrade,
};

/// Protocol version stamped on envelopes this crate produces.
pub const PROTOCOL_VERSION: &str = "0.11.0";

/// Maximum encoded envelope size (1 MB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
