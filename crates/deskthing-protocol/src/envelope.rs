//! Wire envelope, routing scope and the validated envelope type.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PROTOCOL_VERSION;

/// Identifier reserved for the built-in front-end channel.
pub const CLIENT_ID: &str = "client";
/// Identifier reserved for the host itself.
pub const SERVER_ID: &str = "server";
/// Identifier reserved for the host's music subsystem.
pub const MUSIC_ID: &str = "music";

/// A directed communication channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    AppToServer,
    ServerToApp,
    ServerToClient,
    ClientToServer,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppToServer => "app->server",
            Self::ServerToApp => "server->app",
            Self::ServerToClient => "server->client",
            Self::ClientToServer => "client->server",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which handler set an envelope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// The built-in front-end channel.
    Client,
    /// The host itself.
    Server,
    /// The host's music subsystem.
    Music,
    /// Any third-party app.
    App,
}

impl Scope {
    /// Resolves the scope from the envelope's `app` and `source` fields.
    ///
    /// The reserved `client` identifier wins over everything else, in either
    /// field, so an app cannot reach app handlers by calling itself `client`.
    pub fn resolve(app: Option<&str>, source: Option<&str>) -> Self {
        let fields = [app, source];
        if fields.contains(&Some(CLIENT_ID)) {
            return Self::Client;
        }
        match app.or(source) {
            Some(SERVER_ID) => Self::Server,
            Some(MUSIC_ID) => Self::Music,
            _ => Self::App,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => CLIENT_ID,
            Self::Server => SERVER_ID,
            Self::Music => MUSIC_ID,
            Self::App => "app",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an app id collides with a reserved identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is a reserved identifier and cannot name an app")]
pub struct ReservedAppId(pub String);

/// A third-party app identifier, guaranteed not to be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId(String);

impl AppId {
    pub fn new(id: impl Into<String>) -> Result<Self, ReservedAppId> {
        let id = id.into();
        if [CLIENT_ID, SERVER_ID, MUSIC_ID].contains(&id.as_str()) {
            return Err(ReservedAppId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// An envelope as it appears on the wire, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvelope {
    /// Coarse domain tag.
    #[serde(rename = "type")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Older clients identified themselves with `deviceId`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Set by senders still using a pre-0.11 shape.
    #[serde(default, skip_serializing_if = "is_false")]
    pub legacy: bool,
    /// Version the envelope had before it was upgraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded_from: Option<String>,
}

impl RawEnvelope {
    /// Creates an envelope with only a domain tag.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            request: None,
            payload: None,
            app: None,
            source: None,
            version: None,
            client_id: None,
            device_id: None,
            legacy: false,
            upgraded_from: None,
        }
    }

    /// Creates an envelope sent by a third-party app.
    pub fn from_app(app: &AppId, domain: impl Into<String>) -> Self {
        Self::new(domain)
            .with_source(app.as_str())
            .with_version(PROTOCOL_VERSION)
    }

    /// Creates an envelope addressed to the built-in client channel.
    pub fn to_client(domain: impl Into<String>) -> Self {
        Self::new(domain).with_app(CLIENT_ID)
    }

    pub fn with_request(mut self, request: impl Into<String>) -> Self {
        self.request = Some(request.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Marks the envelope as using a pre-0.11 shape.
    pub fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }

    /// The routing scope of this envelope.
    pub fn scope(&self) -> Scope {
        Scope::resolve(self.app.as_deref(), self.source.as_deref())
    }

    /// The client id carried by the envelope or, failing that, its payload.
    pub fn correlation_id(&self) -> Option<&str> {
        self.client_id.as_deref().or_else(|| {
            self.payload
                .as_ref()
                .and_then(|payload| payload.get("clientId"))
                .and_then(Value::as_str)
        })
    }
}

/// A resolved `(scope, domain, request)` triple.
///
/// `request` is `None` for domains without a sub-request; in a handler
/// registry it acts as the wildcard for its domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub scope: Scope,
    pub domain: String,
    pub request: Option<String>,
}

impl RouteKey {
    pub fn new(scope: Scope, domain: impl Into<String>, request: Option<&str>) -> Self {
        Self {
            scope,
            domain: domain.into(),
            request: request.map(str::to_string),
        }
    }

    /// Key matching every request of `domain`.
    pub fn wildcard(scope: Scope, domain: impl Into<String>) -> Self {
        Self::new(scope, domain, None)
    }

    /// The same key with the request dropped.
    pub fn domain_wildcard(&self) -> Self {
        Self {
            scope: self.scope,
            domain: self.domain.clone(),
            request: None,
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request {
            Some(request) => write!(f, "{}:{}/{}", self.scope, self.domain, request),
            None => write!(f, "{}:{}/*", self.scope, self.domain),
        }
    }
}

/// Envelope fields that survive validation next to the typed message.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeMeta {
    pub channel: Channel,
    pub app: Option<String>,
    pub source: Option<String>,
    pub version: Option<String>,
    pub client_id: Option<String>,
    pub upgraded_from: Option<String>,
}

/// A validated envelope whose payload has been narrowed to `M`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedEnvelope<M> {
    pub route: RouteKey,
    pub meta: EnvelopeMeta,
    pub message: M,
}

impl<M> TypedEnvelope<M> {
    pub fn scope(&self) -> Scope {
        self.route.scope
    }

    pub fn domain(&self) -> &str {
        &self.route.domain
    }

    pub fn request(&self) -> Option<&str> {
        self.route.request.as_deref()
    }

    /// The sending or target app, whichever the envelope names.
    pub fn app(&self) -> Option<&str> {
        self.meta.app.as_deref().or(self.meta.source.as_deref())
    }
}
