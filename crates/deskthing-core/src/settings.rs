//! App settings: a tagged union over value types with per-type bounds.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
        .expect("Invalid hex color regex")
});

/// Errors raised when a setting value violates its bounds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingError {
    #[error("{id}: value {value} outside [{min}, {max}]")]
    OutOfRange {
        id: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{id}: range bounds inverted (min {min} > max {max})")]
    InvertedBounds { id: String, min: f64, max: f64 },

    #[error("{id}: string of length {len} exceeds maxLength {max}")]
    TooLong { id: String, len: usize, max: usize },

    #[error("{id}: '{value}' is not one of the declared options")]
    UnknownOption { id: String, value: String },

    #[error("{id}: {len} values exceed maxValues {max}")]
    TooManyValues { id: String, len: usize, max: usize },

    #[error("{id}: duplicate value '{value}' in a unique list")]
    DuplicateValue { id: String, value: String },

    #[error("{id}: ranked value must order every option exactly once")]
    NotAPermutation { id: String },

    #[error("{id}: '{value}' is not a hex color")]
    InvalidColor { id: String, value: String },

    #[error("{id}: cannot assign a {found} value to a {expected} setting")]
    KindMismatch {
        id: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Result type for setting operations.
pub type SettingResult<T> = Result<T, SettingError>;

/// A selectable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingOption {
    pub label: String,
    pub value: String,
}

impl SettingOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// File filter offered by a file setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileType {
    pub name: String,
    pub extensions: Vec<String>,
}

/// Scalar a dependency compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Visibility dependency on another setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingDependency {
    pub setting_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_value: Option<DependencyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_not: Option<DependencyValue>,
}

/// A pointer to a setting owned by some app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingReference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Type-specific part of a setting, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SettingKind {
    Boolean {
        value: bool,
    },
    Number {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    Range {
        value: f64,
        min: f64,
        max: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    String {
        value: String,
        #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Select {
        value: String,
        options: Vec<SettingOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    Multiselect {
        value: Vec<String>,
        options: Vec<SettingOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    List {
        value: Vec<String>,
        options: Vec<SettingOption>,
        #[serde(rename = "maxValues", default, skip_serializing_if = "Option::is_none")]
        max_values: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        orderable: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unique: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    Ranked {
        value: Vec<String>,
        options: Vec<SettingOption>,
    },
    Color {
        value: String,
    },
    File {
        value: String,
        #[serde(rename = "fileTypes", default, skip_serializing_if = "Option::is_none")]
        file_types: Option<Vec<FileType>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
}

impl SettingKind {
    /// Wire name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean { .. } => "boolean",
            Self::Number { .. } => "number",
            Self::Range { .. } => "range",
            Self::String { .. } => "string",
            Self::Select { .. } => "select",
            Self::Multiselect { .. } => "multiselect",
            Self::List { .. } => "list",
            Self::Ranked { .. } => "ranked",
            Self::Color { .. } => "color",
            Self::File { .. } => "file",
        }
    }

    /// The current value in its loosely typed form.
    pub fn value(&self) -> SettingValue {
        match self {
            Self::Boolean { value } => SettingValue::Bool(*value),
            Self::Number { value, .. } | Self::Range { value, .. } => SettingValue::Number(*value),
            Self::String { value, .. }
            | Self::Select { value, .. }
            | Self::Color { value }
            | Self::File { value, .. } => SettingValue::Text(value.clone()),
            Self::Multiselect { value, .. }
            | Self::List { value, .. }
            | Self::Ranked { value, .. } => SettingValue::List(value.clone()),
        }
    }
}

/// A setting value as it arrives in `settings/set-value` style payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl SettingValue {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::List(_) => "list",
        }
    }
}

/// A single app setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<SettingDependency>>,
    #[serde(flatten)]
    pub kind: SettingKind,
}

fn contains_option(options: &[SettingOption], value: &str) -> bool {
    options.iter().any(|option| option.value == value)
}

impl Setting {
    /// Creates a setting with only a label and kind.
    pub fn new(label: impl Into<String>, kind: SettingKind) -> Self {
        Self {
            id: None,
            label: label.into(),
            description: None,
            disabled: None,
            version: None,
            source: None,
            depends_on: None,
            kind,
        }
    }

    /// Builder: set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The id used in error messages; the label when no id is set.
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.label)
    }

    /// Checks the current value against the type-specific bounds.
    pub fn validate(&self) -> SettingResult<()> {
        let id = self.display_id().to_string();
        match &self.kind {
            SettingKind::Boolean { .. } | SettingKind::File { .. } => Ok(()),
            SettingKind::Number {
                value, min, max, ..
            } => {
                let lo = min.unwrap_or(f64::NEG_INFINITY);
                let hi = max.unwrap_or(f64::INFINITY);
                if lo > hi {
                    return Err(SettingError::InvertedBounds { id, min: lo, max: hi });
                }
                if *value < lo || *value > hi {
                    return Err(SettingError::OutOfRange {
                        id,
                        value: *value,
                        min: lo,
                        max: hi,
                    });
                }
                Ok(())
            }
            SettingKind::Range {
                value, min, max, ..
            } => {
                if min > max {
                    return Err(SettingError::InvertedBounds {
                        id,
                        min: *min,
                        max: *max,
                    });
                }
                if value < min || value > max {
                    return Err(SettingError::OutOfRange {
                        id,
                        value: *value,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(())
            }
            SettingKind::String { value, max_length } => match max_length {
                Some(max) if value.chars().count() > *max => Err(SettingError::TooLong {
                    id,
                    len: value.chars().count(),
                    max: *max,
                }),
                _ => Ok(()),
            },
            SettingKind::Select { value, options, .. } => {
                if contains_option(options, value) {
                    Ok(())
                } else {
                    Err(SettingError::UnknownOption {
                        id,
                        value: value.clone(),
                    })
                }
            }
            SettingKind::Multiselect { value, options, .. } => {
                check_options(&id, value, options)
            }
            SettingKind::List {
                value,
                options,
                max_values,
                unique,
                ..
            } => {
                check_options(&id, value, options)?;
                if let Some(max) = max_values {
                    if value.len() > *max {
                        return Err(SettingError::TooManyValues {
                            id,
                            len: value.len(),
                            max: *max,
                        });
                    }
                }
                if unique.unwrap_or(false) {
                    let mut seen = BTreeSet::new();
                    for item in value {
                        if !seen.insert(item) {
                            return Err(SettingError::DuplicateValue {
                                id,
                                value: item.clone(),
                            });
                        }
                    }
                }
                Ok(())
            }
            SettingKind::Ranked { value, options } => {
                let given: BTreeSet<&str> = value.iter().map(String::as_str).collect();
                let declared: BTreeSet<&str> =
                    options.iter().map(|option| option.value.as_str()).collect();
                if value.len() != options.len() || given != declared {
                    return Err(SettingError::NotAPermutation { id });
                }
                Ok(())
            }
            SettingKind::Color { value } => {
                if HEX_COLOR.is_match(value) {
                    Ok(())
                } else {
                    Err(SettingError::InvalidColor {
                        id,
                        value: value.clone(),
                    })
                }
            }
        }
    }

    /// Assigns a new value, keeping the previous one if the result would be
    /// invalid.
    pub fn set_value(&mut self, value: SettingValue) -> SettingResult<()> {
        let mut next = self.kind.clone();
        let mismatch = |expected: &'static str, found: &SettingValue| SettingError::KindMismatch {
            id: self.display_id().to_string(),
            expected,
            found: found.kind_name(),
        };
        match (&mut next, value) {
            (SettingKind::Boolean { value: slot }, SettingValue::Bool(v)) => *slot = v,
            (
                SettingKind::Number { value: slot, .. } | SettingKind::Range { value: slot, .. },
                SettingValue::Number(v),
            ) => *slot = v,
            (
                SettingKind::String { value: slot, .. }
                | SettingKind::Select { value: slot, .. }
                | SettingKind::Color { value: slot }
                | SettingKind::File { value: slot, .. },
                SettingValue::Text(v),
            ) => *slot = v,
            (
                SettingKind::Multiselect { value: slot, .. }
                | SettingKind::List { value: slot, .. }
                | SettingKind::Ranked { value: slot, .. },
                SettingValue::List(v),
            ) => *slot = v,
            (kind, other) => return Err(mismatch(kind.name(), &other)),
        }
        let candidate = Setting {
            kind: next,
            ..self.clone()
        };
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// Replaces the option list of a choice setting. Returns `false` if the
    /// kind has no options.
    pub fn set_options(&mut self, new_options: Vec<SettingOption>) -> bool {
        match &mut self.kind {
            SettingKind::Select { options, .. }
            | SettingKind::Multiselect { options, .. }
            | SettingKind::List { options, .. }
            | SettingKind::Ranked { options, .. } => {
                *options = new_options;
                true
            }
            _ => false,
        }
    }
}

fn check_options(id: &str, values: &[String], options: &[SettingOption]) -> SettingResult<()> {
    match values.iter().find(|value| !contains_option(options, value)) {
        Some(value) => Err(SettingError::UnknownOption {
            id: id.to_string(),
            value: value.clone(),
        }),
        None => Ok(()),
    }
}

/// Settings of one app, keyed by setting id.
///
/// Decoding fills each setting's `id` from its map key, so maps written
/// before settings carried ids decode to the same records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Setting>", into = "BTreeMap<String, Setting>")]
pub struct AppSettings(BTreeMap<String, Setting>);

impl From<BTreeMap<String, Setting>> for AppSettings {
    fn from(mut map: BTreeMap<String, Setting>) -> Self {
        for (key, setting) in &mut map {
            if setting.id.as_deref() != Some(key.as_str()) {
                setting.id = Some(key.clone());
            }
        }
        Self(map)
    }
}

impl From<AppSettings> for BTreeMap<String, Setting> {
    fn from(settings: AppSettings) -> Self {
        settings.0
    }
}

impl AppSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a setting under `id`, overwriting its id field.
    pub fn insert(&mut self, id: impl Into<String>, mut setting: Setting) -> Option<Setting> {
        let id = id.into();
        setting.id = Some(id.clone());
        self.0.insert(id, setting)
    }

    pub fn get(&self, id: &str) -> Option<&Setting> {
        self.0.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Setting> {
        self.0.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Setting> {
        self.0.remove(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Setting)> {
        self.0.iter()
    }

    /// Validates every setting, returning the first failure.
    pub fn validate(&self) -> SettingResult<()> {
        self.0.values().try_for_each(Setting::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn select(value: &str) -> Setting {
        Setting::new(
            "Mode",
            SettingKind::Select {
                value: value.into(),
                options: vec![SettingOption::new("Light", "light"), SettingOption::new("Dark", "dark")],
                placeholder: None,
            },
        )
        .with_id("mode")
    }

    #[test]
    fn decodes_tagged_setting() {
        let setting: Setting = serde_json::from_value(json!({
            "type": "range",
            "label": "Volume",
            "value": 40,
            "min": 0,
            "max": 100,
            "dependsOn": [{"settingId": "enabled", "isValue": true}]
        }))
        .unwrap();
        assert_eq!(setting.kind.name(), "range");
        assert_eq!(setting.depends_on.as_ref().map(Vec::len), Some(1));
        assert!(setting.validate().is_ok());
    }

    #[test]
    fn range_requires_bounds() {
        let result = serde_json::from_value::<Setting>(json!({
            "type": "range",
            "label": "Volume",
            "value": 40
        }));
        assert!(result.is_err());
    }

    #[test]
    fn number_bounds_are_optional() {
        let unbounded = Setting::new(
            "Count",
            SettingKind::Number {
                value: -5.0,
                min: None,
                max: None,
                step: None,
            },
        );
        assert!(unbounded.validate().is_ok());

        let bounded = Setting::new(
            "Count",
            SettingKind::Number {
                value: 11.0,
                min: Some(0.0),
                max: Some(10.0),
                step: None,
            },
        );
        assert!(matches!(
            bounded.validate(),
            Err(SettingError::OutOfRange { .. })
        ));
    }

    #[test]
    fn select_value_must_be_an_option() {
        assert!(select("dark").validate().is_ok());
        assert!(matches!(
            select("sepia").validate(),
            Err(SettingError::UnknownOption { .. })
        ));
    }

    #[test]
    fn list_enforces_max_values_and_uniqueness() {
        let options = vec![SettingOption::new("A", "a"), SettingOption::new("B", "b")];
        let list = Setting::new(
            "Pick",
            SettingKind::List {
                value: vec!["a".into(), "a".into()],
                options: options.clone(),
                max_values: Some(3),
                orderable: None,
                unique: Some(true),
                placeholder: None,
            },
        );
        assert!(matches!(
            list.validate(),
            Err(SettingError::DuplicateValue { .. })
        ));

        let crowded = Setting::new(
            "Pick",
            SettingKind::List {
                value: vec!["a".into(), "b".into()],
                options,
                max_values: Some(1),
                orderable: None,
                unique: None,
                placeholder: None,
            },
        );
        assert!(matches!(
            crowded.validate(),
            Err(SettingError::TooManyValues { len: 2, max: 1, .. })
        ));
    }

    #[test]
    fn ranked_must_be_a_permutation() {
        let options = vec![SettingOption::new("A", "a"), SettingOption::new("B", "b")];
        let ranked = |value: Vec<&str>| {
            Setting::new(
                "Order",
                SettingKind::Ranked {
                    value: value.into_iter().map(String::from).collect(),
                    options: options.clone(),
                },
            )
        };
        assert!(ranked(vec!["b", "a"]).validate().is_ok());
        assert!(ranked(vec!["a"]).validate().is_err());
        assert!(ranked(vec!["a", "a"]).validate().is_err());
    }

    #[test]
    fn color_must_be_hex() {
        for good in ["#fff", "#1a2b3c", "#1a2b3cff"] {
            let setting = Setting::new("Accent", SettingKind::Color { value: good.into() });
            assert!(setting.validate().is_ok(), "{good}");
        }
        let bad = Setting::new("Accent", SettingKind::Color { value: "red".into() });
        assert!(matches!(
            bad.validate(),
            Err(SettingError::InvalidColor { .. })
        ));
    }

    #[test]
    fn set_value_checks_kind_and_bounds() {
        let mut setting = select("light");
        setting
            .set_value(SettingValue::Text("dark".into()))
            .unwrap();
        assert_eq!(setting.kind.value(), SettingValue::Text("dark".into()));

        let err = setting.set_value(SettingValue::Bool(true)).unwrap_err();
        assert!(matches!(err, SettingError::KindMismatch { expected: "select", .. }));

        assert!(setting.set_value(SettingValue::Text("sepia".into())).is_err());
        assert_eq!(setting.kind.value(), SettingValue::Text("dark".into()));
    }

    #[test]
    fn legacy_map_without_ids_decodes() {
        let settings: AppSettings = serde_json::from_value(json!({
            "theme": {
                "type": "select",
                "label": "Theme",
                "value": "dark",
                "options": [{"label": "Dark", "value": "dark"}]
            },
            "volume": {"type": "number", "label": "Volume", "value": 3, "min": 0, "max": 10}
        }))
        .unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings.get("theme").and_then(|s| s.id.as_deref()), Some("theme"));
        assert!(settings.validate().is_ok());

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["volume"]["id"], "volume");
    }
}
