//! Legacy envelope upgrade.
//!
//! [`upgrade`] maps every deprecated envelope shape onto its canonical form.
//! It is pure and idempotent: canonical envelopes pass through unchanged,
//! and an upgraded envelope is canonical.

use semver::Version;
use serde_json::{Map, Value};
use tracing::{debug, error};

use deskthing_core::tracing::PROTOCOL_AUDIT_TARGET;
use deskthing_core::{AppSettings, ButtonMapping, ClientPreferences, MappingProfile};

use crate::PROTOCOL_VERSION;
use crate::envelope::RawEnvelope;
use crate::error::SchemaError;
use crate::schema::{Message, Vocabulary};

/// First version with mapping profiles, client configurations and nested
/// settings payloads.
pub const PROFILES_SINCE: Version = Version::new(0, 11, 0);

/// Profile id given to configurations that predate profiles.
pub const DEFAULT_PROFILE_ID: &str = "default";

/// Upgrades `raw` to the canonical shape of channel `M`.
///
/// Failures are logged under the protocol audit target; they indicate a
/// legacy shape nobody declared.
pub fn upgrade<M: Message>(raw: RawEnvelope) -> Result<RawEnvelope, SchemaError> {
    let domain = raw.domain.clone();
    let result = upgrade_inner::<M>(raw);
    if let Err(err) = &result {
        error!(
            target: PROTOCOL_AUDIT_TARGET,
            channel = %M::CHANNEL,
            domain = %domain,
            error = %err,
            "Legacy envelope has no canonical form"
        );
    }
    result
}

fn upgrade_inner<M: Message>(mut raw: RawEnvelope) -> Result<RawEnvelope, SchemaError> {
    if let Some(device_id) = raw.device_id.take() {
        if raw.client_id.is_none() {
            raw.client_id = Some(device_id);
        }
    }

    let mut raw = M::upgrade_legacy(raw)?;

    if raw.legacy {
        let vocabulary = M::vocabulary(raw.scope());
        if matches!(vocabulary, Vocabulary::Closed(_)) && vocabulary.find(&raw.domain).is_none() {
            return Err(SchemaError::legacy(
                &raw.domain,
                format!("no current or legacy '{}' domain on {}", raw.domain, M::CHANNEL),
            ));
        }
        raw.legacy = false;
    }

    Ok(raw)
}

/// Parses an envelope version, accepting short and four-part forms such
/// as `0.10` and `0.10.4.2`.
pub fn parse_version(version: &str) -> Option<Version> {
    let trimmed = version.trim().trim_start_matches('v');
    if let Ok(parsed) = Version::parse(trimmed) {
        return Some(parsed);
    }
    let mut parts = trimmed.split('.').map(str::parse::<u64>);
    let major = parts.next()?.ok()?;
    let minor = parts.next().transpose().ok()?.unwrap_or(0);
    let patch = parts.next().transpose().ok()?.unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

/// True when the envelope declares a version older than profiles.
///
/// Envelopes without a version, or with one that cannot be parsed, are
/// treated as current.
pub fn predates_profiles(version: Option<&str>) -> bool {
    version
        .and_then(parse_version)
        .is_some_and(|v| v < PROFILES_SINCE)
}

fn retag(raw: &mut RawEnvelope, domain: &str, request: &str) {
    debug!(
        from_domain = %raw.domain,
        from_request = ?raw.request,
        to_domain = domain,
        to_request = request,
        "Upgrading legacy envelope tag"
    );
    raw.domain = domain.to_string();
    raw.request = Some(request.to_string());
}

/// App→Server: settings operations that used to live under `get`, `set` and
/// `delete`.
pub(crate) fn upgrade_app_request(mut raw: RawEnvelope) -> RawEnvelope {
    let target = match (raw.domain.as_str(), raw.request.as_deref()) {
        ("get", Some("config" | "settings")) => Some("get"),
        ("set", Some("settings")) => Some("set"),
        ("set", Some("settings-init")) => Some("init"),
        ("delete", Some("settings")) => Some("delete"),
        _ => None,
    };
    if let Some(request) = target {
        retag(&mut raw, "settings", request);
    }
    raw
}

/// Server→App: `config` events were renamed to `settings`.
pub(crate) fn upgrade_app_event(mut raw: RawEnvelope) -> RawEnvelope {
    if raw.domain == "config" {
        debug!("Upgrading legacy config event to settings");
        raw.domain = "settings".to_string();
    }
    raw
}

/// Client→Server: the client `button` domain became `key`.
pub(crate) fn upgrade_client_request(mut raw: RawEnvelope) -> RawEnvelope {
    if raw.domain == "button" && raw.scope() == crate::Scope::Client {
        debug!("Upgrading legacy button envelope to key");
        raw.domain = "key".to_string();
    }
    raw
}

/// Server→Client payload layouts that changed with profiles.
pub(crate) fn upgrade_device_payload(mut raw: RawEnvelope) -> Result<RawEnvelope, SchemaError> {
    if raw.scope() != crate::Scope::Client || !predates_profiles(raw.version.as_deref()) {
        return Ok(raw);
    }

    let original = raw.version.clone();
    if let Some(payload) = raw.payload.take() {
        let upgraded = match raw.domain.as_str() {
            "settings" => nest_flat_settings(&raw, payload)?,
            "button_mappings" => mapping_profile(&raw, payload)?,
            "configuration" => client_configuration(&raw, payload, original.as_deref())?,
            _ => payload,
        };
        raw.payload = Some(upgraded);
    }

    raw.upgraded_from = original;
    raw.version = Some(PROTOCOL_VERSION.to_string());
    Ok(raw)
}

fn nest_flat_settings(raw: &RawEnvelope, payload: Value) -> Result<Value, SchemaError> {
    let Value::Object(mut map) = payload else {
        return Err(SchemaError::legacy(&raw.domain, "settings payload is not an object"));
    };
    let app = match map.remove("app") {
        Some(Value::String(app)) => app,
        Some(_) => return Err(SchemaError::legacy(&raw.domain, "settings app is not a string")),
        None => raw
            .source
            .clone()
            .ok_or_else(|| SchemaError::legacy(&raw.domain, "settings payload names no app"))?,
    };
    let settings: AppSettings = serde_json::from_value(Value::Object(map))
        .map_err(|e| SchemaError::legacy(&raw.domain, e))?;

    let mut nested = Map::new();
    nested.insert("settings".into(), to_value(raw, &settings)?);
    nested.insert("app".into(), Value::String(app));
    Ok(Value::Object(nested))
}

fn mapping_profile(raw: &RawEnvelope, payload: Value) -> Result<Value, SchemaError> {
    if payload.get("profileId").is_some() {
        return Ok(payload);
    }
    let legacy: ButtonMapping =
        serde_json::from_value(payload).map_err(|e| SchemaError::legacy(&raw.domain, e))?;
    to_value(raw, &MappingProfile::from(legacy))
}

fn client_configuration(
    raw: &RawEnvelope,
    payload: Value,
    version: Option<&str>,
) -> Result<Value, SchemaError> {
    if payload.get("profileId").is_some() {
        return Ok(payload);
    }
    let prefs: ClientPreferences =
        serde_json::from_value(payload).map_err(|e| SchemaError::legacy(&raw.domain, e))?;
    let config = prefs.into_configuration(DEFAULT_PROFILE_ID, version.unwrap_or(PROTOCOL_VERSION));
    to_value(raw, &config)
}

fn to_value<T: serde::Serialize>(raw: &RawEnvelope, value: &T) -> Result<Value, SchemaError> {
    serde_json::to_value(value).map_err(|e| SchemaError::legacy(&raw.domain, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{AppEvent, AppMessage, ClientMessage, DeviceMessage};
    use serde_json::json;

    #[test]
    fn parse_version_accepts_loose_forms() {
        assert_eq!(parse_version("0.10.4.2"), Some(Version::new(0, 10, 4)));
        assert_eq!(parse_version("0.10"), Some(Version::new(0, 10, 0)));
        assert_eq!(parse_version("v0.11.3"), Some(Version::new(0, 11, 3)));
        assert_eq!(parse_version("latest"), None);
        assert!(predates_profiles(Some("0.10.4")));
        assert!(!predates_profiles(Some("0.11.0")));
        assert!(!predates_profiles(Some("garbage")));
        assert!(!predates_profiles(None));
    }

    #[test]
    fn device_id_becomes_client_id() {
        let mut raw = RawEnvelope::new("ping").with_app("client");
        raw.device_id = Some("dev-1".into());
        let upgraded = upgrade::<ClientMessage>(raw).unwrap();
        assert_eq!(upgraded.client_id.as_deref(), Some("dev-1"));
        assert!(upgraded.device_id.is_none());
    }

    #[test]
    fn app_settings_aliases_are_retagged() {
        let cases = [
            ("get", "config", "get"),
            ("get", "settings", "get"),
            ("set", "settings", "set"),
            ("set", "settings-init", "init"),
            ("delete", "settings", "delete"),
        ];
        for (domain, request, expected) in cases {
            let raw = RawEnvelope::new(domain).with_request(request).with_source("weather");
            let upgraded = upgrade::<AppMessage>(raw).unwrap();
            assert_eq!(upgraded.domain, "settings");
            assert_eq!(upgraded.request.as_deref(), Some(expected));
        }

        let untouched = RawEnvelope::new("get").with_request("data");
        assert_eq!(upgrade::<AppMessage>(untouched.clone()).unwrap(), untouched);
    }

    #[test]
    fn config_event_becomes_settings() {
        let raw = RawEnvelope::new("config").with_app("weather");
        assert_eq!(upgrade::<AppEvent>(raw).unwrap().domain, "settings");
    }

    #[test]
    fn legacy_flag_with_unknown_domain_fails() {
        let raw = RawEnvelope::new("teleport").with_source("weather").legacy();
        let err = upgrade::<AppMessage>(raw).unwrap_err();
        assert!(matches!(err, SchemaError::LegacyUpgradeFailure { .. }));

        let known = RawEnvelope::new("get").with_request("config").legacy();
        let upgraded = upgrade::<AppMessage>(known).unwrap();
        assert!(!upgraded.legacy);
    }

    fn legacy_device_envelopes() -> Vec<RawEnvelope> {
        let screensaver =
            json!({"name": "clock", "enabled": true, "running": false, "timeStarted": 0, "prefIndex": 0});
        vec![
            RawEnvelope::to_client("settings")
                .with_version("0.10.4")
                .with_payload(json!({
                    "app": "weather",
                    "units": {"type": "select", "label": "Units", "value": "metric",
                              "options": [{"label": "Metric", "value": "metric"}]}
                })),
            RawEnvelope::to_client("button_mappings")
                .with_version("0.10.4")
                .with_payload(json!({
                    "id": "default", "name": "Default", "version": "0.10.0", "version_code": 10,
                    "mapping": {"wheel1": {"10": {"id": "play", "source": "server"}}}
                })),
            RawEnvelope::to_client("configuration")
                .with_request("set")
                .with_version("0.10.4")
                .with_payload(json!({
                    "appTrayState": "peek", "volume": "bar", "ShowNotifications": true,
                    "Screensaver": screensaver, "ScreensaverType": {"version": 1, "type": "clock"},
                    "onboarding": false, "showPullTabs": true, "saveLocation": true, "use24hour": false
                })),
        ]
    }

    #[test]
    fn device_layouts_are_upgraded() {
        let upgraded: Vec<_> = legacy_device_envelopes()
            .into_iter()
            .map(|raw| upgrade::<DeviceMessage>(raw).unwrap())
            .collect();

        let settings = &upgraded[0];
        assert_eq!(settings.version.as_deref(), Some(PROTOCOL_VERSION));
        assert_eq!(settings.upgraded_from.as_deref(), Some("0.10.4"));
        let payload = settings.payload.as_ref().unwrap();
        assert_eq!(payload["app"], "weather");
        assert_eq!(payload["settings"]["units"]["id"], "units");

        let mapping = upgraded[1].payload.as_ref().unwrap();
        assert_eq!(mapping["profileId"], "default");

        let config = upgraded[2].payload.as_ref().unwrap();
        assert_eq!(config["profileId"], DEFAULT_PROFILE_ID);
        assert_eq!(config["version"], "0.10.4");
    }

    #[test]
    fn upgrade_is_idempotent() {
        let mut samples = legacy_device_envelopes();
        samples.push(RawEnvelope::to_client("ping").with_version("0.9.0"));
        for raw in samples {
            let once = upgrade::<DeviceMessage>(raw).unwrap();
            let twice = upgrade::<DeviceMessage>(once.clone()).unwrap();
            assert_eq!(once, twice);
        }

        let app = RawEnvelope::new("set").with_request("settings-init").legacy();
        let once = upgrade::<AppMessage>(app).unwrap();
        assert_eq!(upgrade::<AppMessage>(once.clone()).unwrap(), once);
    }

    #[test]
    fn undecodable_legacy_payload_is_reported() {
        let raw = RawEnvelope::to_client("button_mappings")
            .with_version("0.10.0")
            .with_payload(json!({"name": "missing everything"}));
        assert!(matches!(
            upgrade::<DeviceMessage>(raw),
            Err(SchemaError::LegacyUpgradeFailure { .. })
        ));
    }
}
