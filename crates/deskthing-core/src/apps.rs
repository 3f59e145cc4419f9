//! App records: manifests, runtime state and persisted app data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mappings::{Action, Key};
use crate::settings::AppSettings;
use crate::tasks::Task;

/// Arbitrary key/value data an app persists through the host.
pub type SavedData = BTreeMap<String, Value>;

/// Platforms an app can declare support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Windows,
    Linux,
    Mac,
    Mac64,
    Macarm,
    Android,
    Ios,
    Arm64,
    X64,
}

/// Capability tags on an app manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagType {
    #[serde(rename = "audiosource")]
    AudioSource,
    #[serde(rename = "screensaver")]
    ScreenSaver,
    #[serde(rename = "utilityOnly")]
    UtilityOnly,
    #[serde(rename = "webappOnly")]
    WebAppOnly,
}

/// Minimum host versions an app needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredVersions {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub client: String,
}

/// Static description of an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppManifest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<PlatformType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagType>,
    #[serde(default)]
    pub required_versions: RequiredVersions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postinstall: Option<bool>,
    #[serde(
        rename = "postinstall_message",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub postinstall_message: Option<String>,
    #[serde(
        rename = "postinstall_script",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub postinstall_script: Option<String>,
    #[serde(rename = "version_code", default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<f64>,
    #[serde(
        rename = "compatible_server",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub compatible_server: Option<Vec<f64>>,
    #[serde(
        rename = "compatible_client",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub compatible_client: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_audio_source: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_screen_saver: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_local_app: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_web_app: Option<bool>,
}

impl AppManifest {
    /// Folds the deprecated boolean flags into `tags` and clears them.
    pub fn normalize_tags(&mut self) {
        let folded = [
            (self.is_audio_source.take(), TagType::AudioSource),
            (self.is_screen_saver.take(), TagType::ScreenSaver),
            (self.is_web_app.take(), TagType::WebAppOnly),
        ];
        for (flag, tag) in folded {
            if flag == Some(true) && !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    pub fn has_tag(&self, tag: TagType) -> bool {
        self.tags.contains(&tag)
    }
}

/// Verification and update state of an installed app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMeta {
    pub version: String,
    pub verified: bool,
    pub verified_manifest: bool,
    pub update_available: bool,
    pub update_checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_available_version: Option<String>,
}

/// An installed app as the host tracks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub name: String,
    pub enabled: bool,
    pub running: bool,
    #[serde(default)]
    pub time_started: i64,
    #[serde(default)]
    pub pref_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<AppMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<AppManifest>,
}

/// Everything the host persists for one app.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppDataInterface {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<AppSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SavedData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<BTreeMap<String, Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<BTreeMap<String, Key>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<BTreeMap<String, Action>>,
}

/// A credential or value an app asks the user for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthScope {
    pub instructions: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Input requests keyed by field name.
pub type AuthScopes = BTreeMap<String, AuthScope>;
