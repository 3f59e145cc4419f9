//! Now-playing state reported by music sources.
//!
//! Two wire versions exist. Version 1 reports capabilities as boolean
//! `can_*` flags; version 2 carries a list of ability tags. Both decode to
//! the canonical [`SongData`], selected by the explicit `version` field.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use thiserror::Error;

/// Version written by current music sources.
pub const CURRENT_SONG_VERSION: u64 = 2;

/// Errors raised while decoding song payloads.
#[derive(Debug, Error)]
pub enum SongError {
    #[error("unsupported song data version: {0}")]
    UnsupportedVersion(Value),

    #[error("invalid song data: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Something a music source can do for the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongAbility {
    Like,
    Shuffle,
    Repeat,
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    Rewind,
    FastForward,
    ChangeVolume,
    SetOutput,
}

/// Repeat mode. The version 1 `context` mode is read as `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    #[default]
    Off,
    #[serde(alias = "context")]
    All,
    Track,
}

/// Album-art derived color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeColor {
    pub value: Vec<u8>,
    pub rgb: String,
    pub rgba: String,
    pub hex: String,
    pub hexa: String,
    pub is_dark: bool,
    pub is_light: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fields shared by both wire versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub track_name: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub playlist: Option<String>,
    #[serde(default)]
    pub playlist_id: Option<String>,
    #[serde(default)]
    pub shuffle_state: Option<bool>,
    #[serde(default)]
    pub repeat_state: RepeatState,
    pub is_playing: bool,
    /// Milliseconds.
    #[serde(default, deserialize_with = "whole_millis")]
    pub track_duration: Option<u64>,
    #[serde(default, deserialize_with = "whole_millis")]
    pub track_progress: Option<u64>,
    #[serde(default, deserialize_with = "whole_volume")]
    pub volume: u32,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ThemeColor>,
}

/// Music sources report positions as plain numbers, fractional ones
/// included. They are rounded to whole milliseconds.
fn whole_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer)?
        .map(|value| {
            if value.is_finite() && value >= 0.0 {
                Ok(value.round() as u64)
            } else {
                Err(de::Error::custom(format!("invalid duration: {value}")))
            }
        })
        .transpose()
}

fn whole_volume<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(0),
        Some(value) if value.is_finite() && (0.0..=f64::from(u32::MAX)).contains(&value) => {
            Ok(value.round() as u32)
        }
        Some(value) => Err(de::Error::custom(format!("invalid volume: {value}"))),
    }
}

/// Boolean capability flags of the version 1 layout.
///
/// Version 2 payloads may still carry them; they are deprecated there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyFlags {
    #[serde(default)]
    pub can_like: bool,
    #[serde(default)]
    pub can_change_volume: bool,
    #[serde(default)]
    pub can_set_output: bool,
    #[serde(default)]
    pub can_fast_forward: bool,
    #[serde(default)]
    pub can_skip: bool,
}

impl LegacyFlags {
    /// Abilities implied by the flags.
    pub fn abilities(&self) -> BTreeSet<SongAbility> {
        let mut set = BTreeSet::new();
        if self.can_like {
            set.insert(SongAbility::Like);
        }
        if self.can_skip {
            set.extend([SongAbility::Next, SongAbility::Previous]);
        }
        if self.can_fast_forward {
            set.extend([SongAbility::FastForward, SongAbility::Rewind]);
        }
        if self.can_change_volume {
            set.insert(SongAbility::ChangeVolume);
        }
        if self.can_set_output {
            set.insert(SongAbility::SetOutput);
        }
        set
    }
}

/// Version 1 wire layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongDataV1 {
    #[serde(flatten)]
    pub track: TrackInfo,
    #[serde(flatten)]
    pub flags: LegacyFlags,
}

/// Version 2 wire layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongDataV2 {
    #[serde(flatten)]
    pub track: TrackInfo,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub abilities: Vec<SongAbility>,
    #[serde(flatten)]
    pub flags: LegacyFlags,
}

/// Canonical now-playing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongData {
    pub version: u64,
    #[serde(flatten)]
    pub track: TrackInfo,
    #[serde(default)]
    pub source: String,
    pub abilities: BTreeSet<SongAbility>,
}

impl SongData {
    /// Normalizes a version 1 payload.
    pub fn from_v1(v1: SongDataV1) -> Self {
        Self {
            version: CURRENT_SONG_VERSION,
            track: v1.track,
            source: String::new(),
            abilities: v1.flags.abilities(),
        }
    }

    /// Normalizes a version 2 payload, folding in any deprecated flags.
    pub fn from_v2(v2: SongDataV2) -> Self {
        let mut abilities: BTreeSet<SongAbility> = v2.abilities.into_iter().collect();
        abilities.extend(v2.flags.abilities());
        Self {
            version: CURRENT_SONG_VERSION,
            track: v2.track,
            source: v2.source,
            abilities,
        }
    }

    /// Decodes a song payload of either version.
    ///
    /// The decode path is chosen by the `version` field alone; an absent
    /// version means 1.
    pub fn decode(value: Value) -> Result<Self, SongError> {
        match value.get("version") {
            None | Some(Value::Null) => Ok(Self::from_v1(serde_json::from_value(value)?)),
            Some(Value::Number(n)) if n.as_u64() == Some(1) => {
                Ok(Self::from_v1(serde_json::from_value(value)?))
            }
            Some(Value::Number(n)) if n.as_u64() == Some(2) => {
                Ok(Self::from_v2(serde_json::from_value(value)?))
            }
            Some(other) => Err(SongError::UnsupportedVersion(other.clone())),
        }
    }

    pub fn can(&self, ability: SongAbility) -> bool {
        self.abilities.contains(&ability)
    }

    /// The flags a version 1 consumer expects.
    pub fn legacy_flags(&self) -> LegacyFlags {
        LegacyFlags {
            can_like: self.can(SongAbility::Like),
            can_change_volume: self.can(SongAbility::ChangeVolume),
            can_set_output: self.can(SongAbility::SetOutput),
            can_fast_forward: self.can(SongAbility::FastForward),
            can_skip: self.can(SongAbility::Next),
        }
    }

    /// Renders the version 1 layout for older clients.
    pub fn to_v1(&self) -> SongDataV1 {
        SongDataV1 {
            track: self.track.clone(),
            flags: self.legacy_flags(),
        }
    }
}

/// Sub-requests of the music domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioRequest {
    Next,
    Previous,
    Rewind,
    FastForward,
    Play,
    Pause,
    Stop,
    Seek,
    Like,
    Song,
    Volume,
    Repeat,
    Shuffle,
    Refresh,
}

impl AudioRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Rewind => "rewind",
            Self::FastForward => "fast_forward",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Seek => "seek",
            Self::Like => "like",
            Self::Song => "song",
            Self::Volume => "volume",
            Self::Repeat => "repeat",
            Self::Shuffle => "shuffle",
            Self::Refresh => "refresh",
        }
    }
}
