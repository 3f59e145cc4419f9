//! Actions, keys and button mapping profiles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Input gesture a key can be bound on.
///
/// Serialized as its numeric index. The deprecated `EventFlavor` enum shares
/// the numbering, so both decode to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EventMode {
    KeyUp = 0,
    KeyDown = 1,
    ScrollUp = 2,
    ScrollDown = 3,
    ScrollLeft = 4,
    ScrollRight = 5,
    SwipeUp = 6,
    SwipeDown = 7,
    SwipeLeft = 8,
    SwipeRight = 9,
    PressShort = 10,
    PressLong = 11,
}

impl TryFrom<u8> for EventMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::KeyUp,
            1 => Self::KeyDown,
            2 => Self::ScrollUp,
            3 => Self::ScrollDown,
            4 => Self::ScrollLeft,
            5 => Self::ScrollRight,
            6 => Self::SwipeUp,
            7 => Self::SwipeDown,
            8 => Self::SwipeLeft,
            9 => Self::SwipeRight,
            10 => Self::PressShort,
            11 => Self::PressLong,
            other => return Err(format!("event mode out of range: {other}")),
        })
    }
}

impl From<EventMode> for u8 {
    fn from(mode: EventMode) -> Self {
        mode as u8
    }
}

/// Category tag shown next to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTag {
    Nav,
    Media,
    Basic,
}

/// A user-triggerable action registered by an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Passed to the action when triggered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_instructions: Option<String>,
    /// Falls back to the action id when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<f64>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<ActionTag>,
}

impl Action {
    /// Creates an enabled action with only the required fields.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            value: None,
            value_options: None,
            value_instructions: None,
            icon: None,
            source: None,
            version: version.into(),
            version_code: None,
            enabled: true,
            tag: None,
        }
    }

    /// Builder: set the owning app.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The icon name to render, defaulting to the id.
    pub fn icon_name(&self) -> &str {
        self.icon.as_deref().unwrap_or(&self.id)
    }

    /// A reference to this action, if it has a known source.
    pub fn reference(&self) -> Option<ActionReference> {
        Some(ActionReference {
            id: self.id.clone(),
            value: self.value.clone(),
            enabled: Some(self.enabled),
            source: self.source.clone()?,
        })
    }
}

/// Partial action as sent by `action/add`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<ActionTag>,
}

impl ActionPatch {
    /// Completes the patch into an action owned by `source`.
    ///
    /// Returns `None` when the patch carries no id.
    pub fn into_action(self, source: &str, app_version: &str) -> Option<Action> {
        Some(Action {
            id: self.id?,
            name: self.name,
            description: self.description,
            value: self.value,
            value_options: self.value_options,
            value_instructions: self.value_instructions,
            icon: self.icon,
            source: Some(self.source.unwrap_or_else(|| source.to_string())),
            version: self.version.unwrap_or_else(|| app_version.to_string()),
            version_code: None,
            enabled: self.enabled.unwrap_or(true),
            tag: self.tag,
        })
    }
}

/// A pointer to an action owned by some app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    pub source: String,
}

/// Either a full action or a reference to one.
///
/// A full action always carries `version` and `enabled`; anything else is a
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionTarget {
    Action(Action),
    Reference(ActionReference),
}

impl ActionTarget {
    pub fn id(&self) -> &str {
        match self {
            Self::Action(action) => &action.id,
            Self::Reference(reference) => &reference.id,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Action(action) => action.source.as_deref(),
            Self::Reference(reference) => Some(&reference.source),
        }
    }
}

/// A physical or virtual key registered by an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub id: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<f64>,
    pub modes: Vec<EventMode>,
}

impl Key {
    pub fn supports(&self, mode: EventMode) -> bool {
        self.modes.contains(&mode)
    }
}

/// Partial key as sent by `key/add`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modes: Option<Vec<EventMode>>,
}

impl KeyPatch {
    /// Completes the patch into a key owned by `source`.
    pub fn into_key(self, source: &str, app_version: &str) -> Option<Key> {
        Some(Key {
            id: self.id?,
            source: self.source.unwrap_or_else(|| source.to_string()),
            description: self.description,
            version: self.version.unwrap_or_else(|| app_version.to_string()),
            enabled: self.enabled.unwrap_or(true),
            version_code: None,
            modes: self.modes.unwrap_or_default(),
        })
    }
}

/// A pointer to a key owned by some app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyReference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<EventMode>,
    pub source: String,
}

/// Per-key, per-mode action bindings.
///
/// Mode keys are the numeric `EventMode` values rendered as strings, which is
/// how the JSON object keys arrive on the wire.
pub type ButtonMappingStructure = BTreeMap<String, BTreeMap<String, ActionReference>>;

/// The mapping profile sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingProfile {
    pub mapping: ButtonMappingStructure,
    pub actions: Option<Vec<Action>>,
    pub keys: Option<Vec<Key>>,
    pub profile_id: String,
}

impl MappingProfile {
    /// The action bound to `key_id` under `mode`, if any.
    pub fn binding(&self, key_id: &str, mode: EventMode) -> Option<&ActionReference> {
        self.mapping
            .get(key_id)?
            .get(&u8::from(mode).to_string())
    }
}

/// Pre-profile mapping layout: profile metadata with the mapping inlined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonMapping {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub version_code: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    pub mapping: ButtonMappingStructure,
}

impl From<ButtonMapping> for MappingProfile {
    fn from(legacy: ButtonMapping) -> Self {
        Self {
            mapping: legacy.mapping,
            actions: None,
            keys: None,
            profile_id: legacy.id,
        }
    }
}

/// Payload delivered when an action fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCallback {
    pub id: String,
    pub value: CallbackValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallbackValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_mode_is_numeric_on_the_wire() {
        assert_eq!(serde_json::to_value(EventMode::PressLong).unwrap(), json!(11));
        let mode: EventMode = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(mode, EventMode::ScrollUp);
        assert!(serde_json::from_value::<EventMode>(json!(12)).is_err());
    }

    #[test]
    fn action_target_distinguishes_reference() {
        let full: ActionTarget =
            serde_json::from_value(json!({"id": "play", "version": "1.0.0", "enabled": true}))
                .unwrap();
        assert!(matches!(full, ActionTarget::Action(_)));

        let reference: ActionTarget =
            serde_json::from_value(json!({"id": "play", "source": "spotify"})).unwrap();
        assert!(matches!(reference, ActionTarget::Reference(_)));
        assert_eq!(reference.source(), Some("spotify"));
    }

    #[test]
    fn action_patch_fills_defaults() {
        let patch = ActionPatch {
            id: Some("skip".into()),
            ..Default::default()
        };
        let action = patch.into_action("spotify", "0.3.0").unwrap();
        assert_eq!(action.source.as_deref(), Some("spotify"));
        assert_eq!(action.version, "0.3.0");
        assert!(action.enabled);
        assert_eq!(action.icon_name(), "skip");

        assert!(ActionPatch::default().into_action("spotify", "0.3.0").is_none());
    }

    #[test]
    fn legacy_button_mapping_upgrades_to_profile() {
        let legacy: ButtonMapping = serde_json::from_value(json!({
            "id": "default",
            "name": "Default",
            "version": "0.9.0",
            "version_code": 9,
            "mapping": {"wheel1": {"10": {"id": "play", "source": "server"}}}
        }))
        .unwrap();

        let profile = MappingProfile::from(legacy);
        assert_eq!(profile.profile_id, "default");
        assert!(profile.actions.is_none());
        let bound = profile.binding("wheel1", EventMode::PressShort).unwrap();
        assert_eq!(bound.id, "play");
        assert!(profile.binding("wheel1", EventMode::PressLong).is_none());
    }
}
