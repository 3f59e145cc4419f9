//! Client→Server requests.
//!
//! The vocabulary depends on the scope: the client shell talks to the
//! client and server scopes, playback controls go to music, and app views
//! talk to their own app.

use serde::Deserialize;
use serde_json::Value;

use deskthing_core::clients::ClientPreferences;
use deskthing_core::mappings::{ActionTarget, KeyReference};
use deskthing_core::settings::{AppSettings, SettingValue};
use deskthing_core::{Log, LogDomain, LogLevel};

use super::music::{MUSIC_VOCABULARY, MusicEvent};
use crate::envelope::{Channel, RawEnvelope, RouteKey, Scope};
use crate::error::SchemaError;
use crate::schema::{DomainSpec, Message, Vocabulary, payload, undeclared};
use crate::upgrade::upgrade_client_request;

const LOG_LEVELS: &[&str] = &["message", "log", "warning", "error", "debugging", "fatal"];

/// Requests addressed to the client's own scope.
pub const CLIENT_SCOPE_VOCABULARY: &[DomainSpec] = &[
    DomainSpec::coarse("ping"),
    DomainSpec::coarse("pong"),
    DomainSpec::closed(
        "get",
        &["manifest", "music", "settings", "apps", "key", "action"],
    ),
    DomainSpec::coarse("action"),
    DomainSpec::open("key", false),
    DomainSpec::with_default("log", LOG_LEVELS, "log"),
];

/// Requests addressed to the host itself.
pub const SERVER_SCOPE_VOCABULARY: &[DomainSpec] = &[
    DomainSpec::closed("set", &["update_pref_index"]),
    DomainSpec::closed("get", &["initialData"]),
    DomainSpec::coarse("action"),
    DomainSpec::coarse("manifest"),
    DomainSpec::coarse("ping"),
    DomainSpec::coarse("pong"),
    DomainSpec::open("log", false),
    DomainSpec::with_default("view", &["change"], "change"),
    DomainSpec::closed("config", &["set", "get"]),
];

/// Requests an app view sends to its own app.
pub const APP_VIEW_VOCABULARY: &[DomainSpec] = &[
    DomainSpec::open("action", false),
    DomainSpec::closed("settings", &["update", "set"]),
    DomainSpec::coarse("app_payload"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientGet {
    Manifest,
    Music,
    Settings,
    Apps,
    Key,
    Action,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ClientLogPayload {
    message: String,
    #[serde(default)]
    data: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrefIndex {
    pub app: String,
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewChange {
    #[serde(default)]
    pub current_app: Option<String>,
    #[serde(default)]
    pub previous_app: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SettingUpdate {
    pub id: String,
    pub value: SettingValue,
}

/// Client-scope requests.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Ping,
    Pong,
    Get(ClientGet),
    Action(ActionTarget),
    Key(KeyReference),
    Log(Log),
}

/// Server-scope requests.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerRequest {
    UpdatePrefIndex(PrefIndex),
    InitialData,
    Action(ActionTarget),
    Manifest(Value),
    Ping,
    Pong,
    Log(Log),
    ViewChange(ViewChange),
    SetConfig(Box<ClientPreferences>),
    GetConfig,
}

/// Requests from an app view to its app.
#[derive(Debug, Clone, PartialEq)]
pub enum AppViewRequest {
    Action(ActionTarget),
    UpdateSetting(SettingUpdate),
    SetSettings(AppSettings),
    /// Free-form traffic the app defines for itself.
    Payload(Option<Box<RawEnvelope>>),
}

/// A validated Client→Server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Client(ClientRequest),
    Server(ServerRequest),
    Music(MusicEvent),
    App(AppViewRequest),
}

impl Message for ClientMessage {
    const CHANNEL: Channel = Channel::ClientToServer;

    fn vocabulary(scope: Scope) -> Vocabulary {
        Vocabulary::Closed(match scope {
            Scope::Client => CLIENT_SCOPE_VOCABULARY,
            Scope::Server => SERVER_SCOPE_VOCABULARY,
            Scope::Music => MUSIC_VOCABULARY,
            Scope::App => APP_VIEW_VOCABULARY,
        })
    }

    fn decode(route: &RouteKey, raw: &RawEnvelope) -> Result<Self, SchemaError> {
        match route.scope {
            Scope::Client => decode_client(route, raw).map(Self::Client),
            Scope::Server => decode_server(route, raw).map(Self::Server),
            Scope::Music => MusicEvent::decode(Self::CHANNEL, route, raw).map(Self::Music),
            Scope::App => decode_app_view(route, raw).map(Self::App),
        }
    }

    fn upgrade_legacy(raw: RawEnvelope) -> Result<RawEnvelope, SchemaError> {
        Ok(upgrade_client_request(raw))
    }
}

fn decode_client(route: &RouteKey, raw: &RawEnvelope) -> Result<ClientRequest, SchemaError> {
    let request = route.request.as_deref();
    Ok(match route.domain.as_str() {
        "ping" => ClientRequest::Ping,
        "pong" => ClientRequest::Pong,
        "get" => ClientRequest::Get(match request {
            Some("manifest") => ClientGet::Manifest,
            Some("music") => ClientGet::Music,
            Some("settings") => ClientGet::Settings,
            Some("apps") => ClientGet::Apps,
            Some("key") => ClientGet::Key,
            Some("action") => ClientGet::Action,
            _ => return Err(undeclared(ClientMessage::CHANNEL, route)),
        }),
        "action" => ClientRequest::Action(payload(route, raw)?),
        "key" => ClientRequest::Key(payload(route, raw)?),
        "log" => {
            let level: LogLevel = request
                .unwrap_or_default()
                .parse()
                .map_err(|_| undeclared(ClientMessage::CHANNEL, route))?;
            let body: Option<ClientLogPayload> = payload(route, raw)?;
            let mut log = match body {
                Some(body) => {
                    let mut log = Log::new(level, body.message);
                    log.data = body.data;
                    log
                }
                None => Log::new(level, String::new()),
            };
            if let Some(client_id) = raw.correlation_id() {
                log = log.with_source(client_id);
            }
            ClientRequest::Log(log.with_domain(LogDomain::Client))
        }
        _ => return Err(undeclared(ClientMessage::CHANNEL, route)),
    })
}

fn decode_server(route: &RouteKey, raw: &RawEnvelope) -> Result<ServerRequest, SchemaError> {
    let request = route.request.as_deref();
    Ok(match (route.domain.as_str(), request) {
        ("set", Some("update_pref_index")) => ServerRequest::UpdatePrefIndex(payload(route, raw)?),
        ("get", Some("initialData")) => ServerRequest::InitialData,
        ("action", _) => ServerRequest::Action(payload(route, raw)?),
        ("manifest", _) => ServerRequest::Manifest(payload(route, raw)?),
        ("ping", _) => ServerRequest::Ping,
        ("pong", _) => ServerRequest::Pong,
        ("log", _) => ServerRequest::Log(payload(route, raw)?),
        ("view", Some("change")) => ServerRequest::ViewChange(payload(route, raw)?),
        ("config", Some("set")) => ServerRequest::SetConfig(payload(route, raw)?),
        ("config", Some("get")) => ServerRequest::GetConfig,
        _ => return Err(undeclared(ClientMessage::CHANNEL, route)),
    })
}

fn decode_app_view(route: &RouteKey, raw: &RawEnvelope) -> Result<AppViewRequest, SchemaError> {
    Ok(match (route.domain.as_str(), route.request.as_deref()) {
        ("action", _) => AppViewRequest::Action(payload(route, raw)?),
        ("settings", Some("update")) => AppViewRequest::UpdateSetting(payload(route, raw)?),
        ("settings", Some("set")) => {
            let settings: AppSettings = payload(route, raw)?;
            settings
                .validate()
                .map_err(|e| SchemaError::shape(&route.domain, Some("set"), e))?;
            AppViewRequest::SetSettings(settings)
        }
        ("app_payload", _) => AppViewRequest::Payload(payload(route, raw)?),
        _ => return Err(undeclared(ClientMessage::CHANNEL, route)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{assert_covers, validate};
    use serde_json::json;

    fn preferences() -> Value {
        json!({
            "appTrayState": "peek",
            "volume": "bar",
            "ShowNotifications": true,
            "Screensaver": {"name": "clock", "enabled": true, "running": false},
            "ScreensaverType": {"version": 1, "type": "clock"},
            "onboarding": false,
            "showPullTabs": true,
            "saveLocation": true,
            "use24hour": false
        })
    }

    #[test]
    fn every_declared_request_decodes() {
        let action = json!({"id": "play", "source": "server"});
        let mut client = vec![
            ("ping", None, Value::Null),
            ("pong", None, Value::Null),
            ("get", Some("manifest"), Value::Null),
            ("get", Some("music"), Value::Null),
            ("get", Some("settings"), Value::Null),
            ("get", Some("apps"), Value::Null),
            ("get", Some("key"), Value::Null),
            ("get", Some("action"), Value::Null),
            ("action", None, action.clone()),
            ("key", Some("wheel1"), json!({"id": "wheel1", "source": "server", "mode": 1})),
        ];
        for level in LOG_LEVELS {
            client.push(("log", Some(*level), json!({"message": "crash"})));
        }
        let server = vec![
            ("set", Some("update_pref_index"), json!({"app": "weather", "index": 2})),
            ("get", Some("initialData"), Value::Null),
            ("action", None, action.clone()),
            ("manifest", None, json!({"id": "client"})),
            ("ping", None, Value::Null),
            ("pong", None, Value::Null),
            ("log", Some("info"), json!({"level": "log", "message": "hello"})),
            ("view", Some("change"), json!({"currentApp": "weather"})),
            ("config", Some("set"), preferences()),
            ("config", Some("get"), Value::Null),
        ];
        let music = vec![
            ("get", Some("song"), Value::Null),
            ("get", Some("refresh"), Value::Null),
            ("set", Some("next"), Value::Null),
            ("set", Some("previous"), Value::Null),
            ("set", Some("fast_forward"), json!(15000)),
            ("set", Some("rewind"), Value::Null),
            ("set", Some("play"), Value::Null),
            ("set", Some("pause"), Value::Null),
            ("set", Some("stop"), Value::Null),
            ("set", Some("seek"), json!(42000)),
            ("set", Some("like"), json!("track-1")),
            ("set", Some("volume"), json!(60)),
            ("set", Some("repeat"), json!("all")),
            ("set", Some("shuffle"), json!(false)),
        ];
        let app_view = vec![
            ("action", Some("refresh"), json!({"id": "refresh", "source": "weather"})),
            ("settings", Some("update"), json!({"id": "units", "value": "metric"})),
            ("settings", Some("set"), json!({})),
            ("app_payload", None, json!({"type": "forecast"})),
        ];

        let scopes = [
            ("client", CLIENT_SCOPE_VOCABULARY, client),
            ("server", SERVER_SCOPE_VOCABULARY, server),
            ("music", MUSIC_VOCABULARY, music),
            ("weather", APP_VIEW_VOCABULARY, app_view),
        ];
        for (app, vocabulary, cases) in scopes {
            assert_covers(vocabulary, cases.iter().map(|(d, r, _)| (*d, *r)));
            for (domain, request, body) in cases {
                let mut raw = RawEnvelope::new(domain).with_app(app).with_payload(body);
                raw.request = request.map(str::to_string);
                let typed = validate::<ClientMessage>(raw)
                    .unwrap_or_else(|e| panic!("{app}:{domain}/{request:?} failed: {e}"));
                let narrowed = matches!(
                    (&typed.message, app),
                    (ClientMessage::Client(_), "client")
                        | (ClientMessage::Server(_), "server")
                        | (ClientMessage::Music(_), "music")
                        | (ClientMessage::App(_), "weather")
                );
                assert!(narrowed, "{app}:{domain} decoded as {:?}", typed.message);
            }
        }
    }

    #[test]
    fn scope_selects_vocabulary() {
        let ping = validate::<ClientMessage>(RawEnvelope::to_client("ping")).unwrap();
        assert_eq!(ping.message, ClientMessage::Client(ClientRequest::Ping));

        let ping = validate::<ClientMessage>(RawEnvelope::new("ping").with_app("server")).unwrap();
        assert_eq!(ping.message, ClientMessage::Server(ServerRequest::Ping));

        let err = validate::<ClientMessage>(RawEnvelope::new("ping").with_app("weather")).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownDomain { .. }));
    }

    #[test]
    fn music_controls_route_to_music_scope() {
        let raw = RawEnvelope::new("set")
            .with_request("volume")
            .with_app("music")
            .with_payload(json!(40));
        assert_eq!(
            validate::<ClientMessage>(raw).unwrap().message,
            ClientMessage::Music(MusicEvent::Volume(40))
        );
    }

    #[test]
    fn legacy_button_becomes_key() {
        let raw = RawEnvelope::to_client("button")
            .with_payload(json!({"id": "DynamicAction1", "source": "server", "mode": 0}));
        let typed = validate::<ClientMessage>(raw).unwrap();
        assert_eq!(typed.domain(), "key");
        assert!(matches!(typed.message, ClientMessage::Client(ClientRequest::Key(_))));
    }

    #[test]
    fn view_change_defaults_request() {
        let raw = RawEnvelope::new("view")
            .with_app("server")
            .with_payload(json!({"currentApp": "weather", "previousApp": "todo"}));
        let typed = validate::<ClientMessage>(raw).unwrap();
        assert_eq!(typed.request(), Some("change"));
        match typed.message {
            ClientMessage::Server(ServerRequest::ViewChange(change)) => {
                assert_eq!(change.current_app.as_deref(), Some("weather"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn client_log_carries_client_id() {
        let raw = RawEnvelope::to_client("log")
            .with_request("warning")
            .with_client_id("c-1")
            .with_payload(json!({"message": "low battery"}));
        let ClientMessage::Client(ClientRequest::Log(log)) = validate::<ClientMessage>(raw).unwrap().message
        else {
            panic!("expected log");
        };
        assert_eq!(log.level, LogLevel::Warn);
        assert_eq!(log.source.as_deref(), Some("c-1"));
    }

    #[test]
    fn app_view_setting_update() {
        let raw = RawEnvelope::new("settings")
            .with_request("update")
            .with_app("weather")
            .with_payload(json!({"id": "units", "value": "imperial"}));
        let typed = validate::<ClientMessage>(raw).unwrap();
        assert_eq!(typed.scope(), Scope::App);
        assert!(matches!(
            typed.message,
            ClientMessage::App(AppViewRequest::UpdateSetting(SettingUpdate { ref id, .. })) if id == "units"
        ));
    }
}
