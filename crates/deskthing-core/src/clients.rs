//! Connected clients: manifests, device info and display configuration.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::apps::App;
use crate::mappings::MappingProfile;

/// How a client reached the host. Numeric on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ClientConnectionMethod {
    #[default]
    Unknown = 0,
    Lan = 1,
    Localhost = 2,
    Adb = 3,
    Ndis = 4,
    Bluetooth = 5,
    Internet = 6,
}

impl TryFrom<u8> for ClientConnectionMethod {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Unknown,
            1 => Self::Lan,
            2 => Self::Localhost,
            3 => Self::Adb,
            4 => Self::Ndis,
            5 => Self::Bluetooth,
            6 => Self::Internet,
            other => return Err(format!("unknown connection method: {other}")),
        })
    }
}

impl From<ClientConnectionMethod> for u8 {
    fn from(method: ClientConnectionMethod) -> Self {
        method as u8
    }
}

/// Kind of device a client runs on. Numeric on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ClientPlatformId {
    #[default]
    Unknown = 0,
    Desktop = 1,
    Tablet = 2,
    Iphone = 3,
    CarThing = 4,
}

impl TryFrom<u8> for ClientPlatformId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Unknown,
            1 => Self::Desktop,
            2 => Self::Tablet,
            3 => Self::Iphone,
            4 => Self::CarThing,
            other => return Err(format!("unknown platform id: {other}")),
        })
    }
}

impl From<ClientPlatformId> for u8 {
    fn from(id: ClientPlatformId) -> Self {
        id as u8
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeviceType {
    id: ClientPlatformId,
    name: String,
    ip: String,
    port: u16,
    method: ClientConnectionMethod,
    #[serde(default)]
    adb_id: Option<String>,
}

/// Where and how a client device is reachable.
///
/// ADB connections always carry the device's `adbId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDeviceType", rename_all = "camelCase")]
pub struct ClientDeviceType {
    pub id: ClientPlatformId,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub method: ClientConnectionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adb_id: Option<String>,
}

impl TryFrom<RawDeviceType> for ClientDeviceType {
    type Error = String;

    fn try_from(raw: RawDeviceType) -> Result<Self, Self::Error> {
        if raw.method == ClientConnectionMethod::Adb && raw.adb_id.is_none() {
            return Err("ADB connections require adbId".to_string());
        }
        Ok(Self {
            id: raw.id,
            name: raw.name,
            ip: raw.ip,
            port: raw.port,
            method: raw.method,
            adb_id: raw.adb_id,
        })
    }
}

/// Versions of the host a client supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compatibility {
    pub server: String,
    pub app: String,
}

/// Static description of a client build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientManifest {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub reactive: bool,
    pub repository: String,
    pub author: String,
    pub version: String,
    pub compatibility: Compatibility,
    pub context: ClientDeviceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatible_server: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolMode {
    #[default]
    Wheel,
    Slider,
    Bar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Hidden,
    #[default]
    Peek,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiniplayerPosition {
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniplayerSettings {
    pub state: ViewMode,
    pub visible: bool,
    pub position: MiniplayerPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreensaverKind {
    Black,
    Logo,
    Clock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreensaverSettings {
    pub version: f64,
    #[serde(rename = "type")]
    pub kind: ScreensaverKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeScale {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub primary: String,
    pub text_light: String,
    pub text_dark: String,
    pub icons: String,
    pub background: String,
    pub scale: ThemeScale,
}

/// Display preferences shared by both configuration layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miniplayer: Option<MiniplayerSettings>,
    pub app_tray_state: ViewMode,
    pub volume: VolMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_view: Option<App>,
    #[serde(rename = "ShowNotifications")]
    pub show_notifications: bool,
    #[serde(rename = "Screensaver")]
    pub screensaver: App,
    #[serde(rename = "ScreensaverType")]
    pub screensaver_type: ScreensaverSettings,
    pub onboarding: bool,
    pub show_pull_tabs: bool,
    pub save_location: bool,
    #[serde(rename = "use24hour")]
    pub use_24_hour: bool,
}

/// Per-profile client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfigurations {
    pub profile_id: String,
    pub version: String,
    #[serde(flatten)]
    pub display: DisplayPreferences,
}

/// Configuration layout used before profiles existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPreferences {
    #[serde(flatten)]
    pub display: DisplayPreferences,
}

impl ClientPreferences {
    /// Attaches the preferences to a profile.
    pub fn into_configuration(
        self,
        profile_id: impl Into<String>,
        version: impl Into<String>,
    ) -> ClientConfigurations {
        ClientConfigurations {
            profile_id: profile_id.into(),
            version: version.into(),
            display: self.display,
        }
    }
}

/// A connected (or recently connected) client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(rename = "currentProfileID", default, skip_serializing_if = "Option::is_none")]
    pub current_profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_configuration: Option<ClientConfigurations>,
    #[serde(rename = "currentMappingID", default, skip_serializing_if = "Option::is_none")]
    pub current_mapping_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_mapping: Option<MappingProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_app: Option<String>,
    #[serde(rename = "default_view", default, skip_serializing_if = "Option::is_none")]
    pub default_view: Option<String>,
    pub connection_id: String,
    pub connected: bool,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ClientManifest>,
}

/// Per-client state pushed to a client on connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetaData {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_configuration: Option<ClientConfigurations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_mapping: Option<MappingProfile>,
}

/// Wall-clock time sent to clients.
///
/// `timezoneOffset` follows the browser convention: minutes to add to local
/// time to reach UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePayload {
    pub utc_time: i64,
    pub timezone_offset: i32,
}

impl TimePayload {
    /// The current time in the host's local zone.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            utc_time: now.timestamp_millis(),
            timezone_offset: -now.offset().local_minus_utc() / 60,
        }
    }

    /// Parses an RFC 3339 timestamp, keeping its offset.
    pub fn from_rfc3339(value: &str) -> Result<Self, chrono::ParseError> {
        let parsed = DateTime::parse_from_rfc3339(value)?;
        Ok(Self::from_datetime(&parsed))
    }

    pub fn from_datetime<Tz: TimeZone>(time: &DateTime<Tz>) -> Self {
        let fixed = time.fixed_offset();
        Self {
            utc_time: fixed.timestamp_millis(),
            timezone_offset: -fixed.offset().local_minus_utc() / 60,
        }
    }

    /// The payload as a UTC instant.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.utc_time)
    }

    /// The payload in its original offset.
    pub fn to_local(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::west_opt(self.timezone_offset * 60)?;
        Some(self.to_utc()?.with_timezone(&offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn screensaver() -> serde_json::Value {
        json!({"name": "clock", "enabled": true, "running": false, "timeStarted": 0, "prefIndex": 0})
    }

    #[test]
    fn adb_devices_require_adb_id() {
        let ok: ClientDeviceType = serde_json::from_value(json!({
            "id": 4, "name": "Car Thing", "ip": "127.0.0.1", "port": 8891, "method": 3, "adbId": "8550"
        }))
        .unwrap();
        assert_eq!(ok.method, ClientConnectionMethod::Adb);
        assert_eq!(ok.id, ClientPlatformId::CarThing);

        let missing = serde_json::from_value::<ClientDeviceType>(json!({
            "id": 4, "name": "Car Thing", "ip": "127.0.0.1", "port": 8891, "method": 3
        }));
        assert!(missing.is_err());

        let lan: ClientDeviceType = serde_json::from_value(json!({
            "id": 1, "name": "Desktop", "ip": "192.168.1.2", "port": 8891, "method": 1
        }))
        .unwrap();
        assert!(lan.adb_id.is_none());
    }

    #[test]
    fn legacy_preferences_become_configuration() {
        let prefs: ClientPreferences = serde_json::from_value(json!({
            "appTrayState": "peek",
            "volume": "bar",
            "ShowNotifications": true,
            "Screensaver": screensaver(),
            "ScreensaverType": {"version": 1, "type": "clock"},
            "onboarding": false,
            "showPullTabs": true,
            "saveLocation": true,
            "use24hour": false
        }))
        .unwrap();

        let config = prefs.into_configuration("default", "0.11.0");
        assert_eq!(config.profile_id, "default");
        assert_eq!(config.display.volume, VolMode::Bar);

        let wire = serde_json::to_value(&config).unwrap();
        assert_eq!(wire["profileId"], "default");
        assert_eq!(wire["ScreensaverType"]["type"], "clock");
    }

    #[test]
    fn time_payload_keeps_offset() {
        let time = TimePayload::from_rfc3339("2024-01-01T12:00:00+02:00").unwrap();
        assert_eq!(time.timezone_offset, -120);
        assert_eq!(time.utc_time, 1_704_103_200_000);
        let local = time.to_local().unwrap();
        assert_eq!(local.to_rfc3339(), "2024-01-01T12:00:00+02:00");
        assert!(TimePayload::from_rfc3339("yesterday").is_err());
    }
}
