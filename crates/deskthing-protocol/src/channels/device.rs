//! Server→Client pushes.
//!
//! Only client-scoped traffic is interpreted. Envelopes addressed to an app
//! are forwarded to that app's view untouched.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use deskthing_core::apps::App;
use deskthing_core::clients::{ClientConfigurations, ClientManifest, ClientMetaData, TimePayload};
use deskthing_core::mappings::{Action, MappingProfile};
use deskthing_core::settings::AppSettings;
use deskthing_core::SongData;

use crate::envelope::{Channel, RawEnvelope, RouteKey, Scope};
use crate::error::SchemaError;
use crate::schema::{DomainSpec, Message, Vocabulary, payload, undeclared};
use crate::upgrade::upgrade_device_payload;

/// Domains the host pushes to the client shell.
pub const DEVICE_VOCABULARY: &[DomainSpec] = &[
    DomainSpec::coarse("global_settings"),
    DomainSpec::coarse("button_mappings"),
    DomainSpec::with_default("configuration", &["set"], "set"),
    DomainSpec::closed("get", &["manifest"]),
    DomainSpec::coarse("error"),
    DomainSpec::coarse("ping"),
    DomainSpec::coarse("pong"),
    DomainSpec::coarse("heartbeat"),
    DomainSpec::coarse("time"),
    DomainSpec::coarse("settings"),
    DomainSpec::coarse("apps"),
    DomainSpec::coarse("music"),
    DomainSpec::with_default("icon", &["set"], "set"),
    DomainSpec::coarse("meta_data"),
    DomainSpec::coarse("manifest"),
    DomainSpec::coarse("action"),
];

/// Time as sent by older hosts (a preformatted string) or current ones.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Payload(TimePayload),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppSettingsPush {
    pub settings: AppSettings,
    pub app: String,
}

/// New icon for an action shown on the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IconUpdate {
    pub action: Action,
    pub icon: String,
    pub source: String,
}

/// A validated Server→Client message.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    GlobalSettings(BTreeMap<String, AppSettings>),
    ButtonMappings(Box<MappingProfile>),
    Configuration(Box<ClientConfigurations>),
    GetManifest,
    Error(Option<String>),
    Ping(Option<String>),
    Pong(Option<String>),
    Heartbeat(Option<String>),
    Time(Option<TimeValue>),
    Settings(Option<AppSettingsPush>),
    Apps(Option<Vec<App>>),
    Music(Option<Box<SongData>>),
    Icon(Option<Box<IconUpdate>>),
    MetaData(Box<ClientMetaData>),
    Manifest(Box<ClientManifest>),
    Action(Box<Action>),
    /// App traffic relayed to the app's view on the client.
    Forward {
        app: String,
        domain: String,
        request: Option<String>,
        payload: Option<Value>,
    },
}

impl Message for DeviceMessage {
    const CHANNEL: Channel = Channel::ServerToClient;

    fn vocabulary(scope: Scope) -> Vocabulary {
        match scope {
            Scope::Client => Vocabulary::Closed(DEVICE_VOCABULARY),
            _ => Vocabulary::Open,
        }
    }

    fn decode(route: &RouteKey, raw: &RawEnvelope) -> Result<Self, SchemaError> {
        if route.scope != Scope::Client {
            return Ok(Self::Forward {
                app: raw.app.clone().or_else(|| raw.source.clone()).unwrap_or_default(),
                domain: route.domain.clone(),
                request: route.request.clone(),
                payload: raw.payload.clone(),
            });
        }

        Ok(match route.domain.as_str() {
            "global_settings" => Self::GlobalSettings(payload(route, raw)?),
            "button_mappings" => Self::ButtonMappings(payload(route, raw)?),
            "configuration" => Self::Configuration(payload(route, raw)?),
            "get" => Self::GetManifest,
            "error" => Self::Error(payload(route, raw)?),
            "ping" => Self::Ping(payload(route, raw)?),
            "pong" => Self::Pong(payload(route, raw)?),
            "heartbeat" => Self::Heartbeat(payload(route, raw)?),
            "time" => Self::Time(payload(route, raw)?),
            "settings" => Self::Settings(payload(route, raw)?),
            "apps" => Self::Apps(payload(route, raw)?),
            "music" => Self::Music(match &raw.payload {
                None | Some(Value::Null) => None,
                Some(value) => Some(Box::new(
                    SongData::decode(value.clone())
                        .map_err(|e| SchemaError::shape(&route.domain, None, e))?,
                )),
            }),
            "icon" => Self::Icon(payload(route, raw)?),
            "meta_data" => Self::MetaData(payload(route, raw)?),
            "manifest" => Self::Manifest(payload(route, raw)?),
            "action" => Self::Action(payload(route, raw)?),
            _ => return Err(undeclared(Self::CHANNEL, route)),
        })
    }

    fn upgrade_legacy(raw: RawEnvelope) -> Result<RawEnvelope, SchemaError> {
        upgrade_device_payload(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{assert_covers, validate};
    use serde_json::json;

    fn action() -> Value {
        json!({"id": "refresh", "source": "weather", "version": "1.0.0", "enabled": true})
    }

    fn app() -> Value {
        json!({"name": "weather", "enabled": true, "running": true})
    }

    #[test]
    fn every_declared_push_decodes() {
        let configuration = json!({
            "profileId": "default",
            "version": "0.11.0",
            "appTrayState": "peek",
            "volume": "bar",
            "ShowNotifications": true,
            "Screensaver": app(),
            "ScreensaverType": {"version": 1, "type": "clock"},
            "onboarding": false,
            "showPullTabs": true,
            "saveLocation": true,
            "use24hour": false
        });
        let mapping = json!({
            "profileId": "default",
            "mapping": {"wheel1": {"0": {"id": "refresh", "source": "weather"}}},
            "actions": [action()],
            "keys": null
        });
        let manifest = json!({
            "id": "client",
            "name": "DeskThing Client",
            "short_name": "Client",
            "description": "Car Thing client",
            "reactive": true,
            "repository": "https://example.com/client",
            "author": "deskthing",
            "version": "0.11.0",
            "compatibility": {"server": ">=0.10.0", "app": ">=0.10.0"},
            "context": {"id": 1, "name": "Desktop", "ip": "192.168.1.2", "port": 8891, "method": 1}
        });
        let cases = [
            ("global_settings", None, json!({"weather": {}})),
            ("button_mappings", None, mapping.clone()),
            ("configuration", Some("set"), configuration.clone()),
            ("get", Some("manifest"), Value::Null),
            ("error", None, json!("app crashed")),
            ("ping", None, Value::Null),
            ("pong", None, json!("c1")),
            ("heartbeat", None, Value::Null),
            ("time", None, json!({"utcTime": 1_700_000_000_000_i64, "timezoneOffset": -60})),
            ("settings", None, json!({"settings": {}, "app": "weather"})),
            ("apps", None, json!([app()])),
            ("music", None, json!({"version": 2, "track_name": "Song", "is_playing": false,
                                   "abilities": ["play", "pause"]})),
            ("icon", Some("set"), json!({"action": action(), "icon": "refresh-alt", "source": "weather"})),
            ("meta_data", None, json!({"clientId": "c1", "currentConfiguration": configuration,
                                       "currentMapping": mapping})),
            ("manifest", None, manifest),
            ("action", None, action()),
        ];
        assert_covers(DEVICE_VOCABULARY, cases.iter().map(|(d, r, _)| (*d, *r)));

        for (domain, request, body) in cases {
            let mut raw = RawEnvelope::to_client(domain).with_payload(body);
            raw.request = request.map(str::to_string);
            let typed = validate::<DeviceMessage>(raw)
                .unwrap_or_else(|e| panic!("{domain}/{request:?} failed: {e}"));
            assert_eq!(typed.domain(), domain);
            assert!(!matches!(typed.message, DeviceMessage::Forward { .. }));
        }
    }

    #[test]
    fn icon_update_carries_full_action() {
        let raw = RawEnvelope::to_client("icon")
            .with_request("set")
            .with_payload(json!({"action": action(), "icon": "refresh-alt", "source": "weather"}));
        let DeviceMessage::Icon(Some(update)) = validate::<DeviceMessage>(raw).unwrap().message else {
            panic!("expected icon update");
        };
        assert_eq!(update.action.id, "refresh");
        assert_eq!(update.icon, "refresh-alt");

        let typed = validate::<DeviceMessage>(RawEnvelope::to_client("icon")).unwrap();
        assert_eq!(typed.request(), Some("set"));
        assert_eq!(typed.message, DeviceMessage::Icon(None));
    }

    #[test]
    fn app_traffic_is_forwarded() {
        let raw = RawEnvelope::new("forecast")
            .with_app("weather")
            .with_payload(json!({"temp": 21}));
        let typed = validate::<DeviceMessage>(raw).unwrap();
        assert_eq!(
            typed.message,
            DeviceMessage::Forward {
                app: "weather".into(),
                domain: "forecast".into(),
                request: None,
                payload: Some(json!({"temp": 21})),
            }
        );
    }

    #[test]
    fn client_domains_are_closed() {
        let err = validate::<DeviceMessage>(RawEnvelope::to_client("forecast")).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownDomain { .. }));
        let typed = validate::<DeviceMessage>(RawEnvelope::to_client("ping")).unwrap();
        assert_eq!(typed.message, DeviceMessage::Ping(None));
    }

    #[test]
    fn time_accepts_both_layouts() {
        let raw = RawEnvelope::to_client("time")
            .with_payload(json!({"utcTime": 1_700_000_000_000_i64, "timezoneOffset": -60}));
        assert!(matches!(
            validate::<DeviceMessage>(raw).unwrap().message,
            DeviceMessage::Time(Some(TimeValue::Payload(_)))
        ));
        let raw = RawEnvelope::to_client("time").with_payload(json!("10:42 AM"));
        assert_eq!(
            validate::<DeviceMessage>(raw).unwrap().message,
            DeviceMessage::Time(Some(TimeValue::Text("10:42 AM".into())))
        );
    }

    #[test]
    fn music_push_normalizes_song() {
        let raw = RawEnvelope::to_client("music")
            .with_payload(json!({"track_name": "Song", "is_playing": true, "can_skip": true}));
        let DeviceMessage::Music(Some(song)) = validate::<DeviceMessage>(raw).unwrap().message else {
            panic!("expected song");
        };
        assert!(song.can(deskthing_core::SongAbility::Next));
    }
}
