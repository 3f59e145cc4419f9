//! Playback events addressed to the music subsystem.

use serde::Deserialize;

use deskthing_core::RepeatState;

use crate::envelope::{Channel, RawEnvelope, RouteKey};
use crate::error::SchemaError;
use crate::schema::{DomainSpec, payload, undeclared};

/// Music-scope domains. `get` defaults to the current song.
pub const MUSIC_VOCABULARY: &[DomainSpec] = &[
    DomainSpec::with_default("get", &["song", "refresh"], "song"),
    DomainSpec::closed(
        "set",
        &[
            "next",
            "previous",
            "fast_forward",
            "rewind",
            "play",
            "pause",
            "stop",
            "seek",
            "like",
            "volume",
            "repeat",
            "shuffle",
        ],
    ),
];

/// What to start playing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlayTarget {
    #[serde(default)]
    pub playlist: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub position: Option<u64>,
}

/// Like payload: a flag for the current track, or a track id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LikeTarget {
    Current(bool),
    Track(String),
}

/// A music get/set request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicEvent {
    /// Current song; `true` forces a refresh.
    Song(Option<bool>),
    Refresh(Option<bool>),
    Next(Option<String>),
    Previous(Option<String>),
    FastForward(Option<u64>),
    Rewind(Option<u64>),
    Play(Option<PlayTarget>),
    Pause,
    Stop,
    Seek(u64),
    Like(LikeTarget),
    Volume(u32),
    Repeat(RepeatState),
    Shuffle(bool),
}

impl MusicEvent {
    pub(crate) fn decode(
        channel: Channel,
        route: &RouteKey,
        raw: &RawEnvelope,
    ) -> Result<Self, SchemaError> {
        Ok(match (route.domain.as_str(), route.request.as_deref()) {
            ("get", Some("song")) => Self::Song(payload(route, raw)?),
            ("get", Some("refresh")) => Self::Refresh(payload(route, raw)?),
            ("set", Some("next")) => Self::Next(payload(route, raw)?),
            ("set", Some("previous")) => Self::Previous(payload(route, raw)?),
            ("set", Some("fast_forward")) => Self::FastForward(payload(route, raw)?),
            ("set", Some("rewind")) => Self::Rewind(payload(route, raw)?),
            ("set", Some("play")) => Self::Play(payload(route, raw)?),
            ("set", Some("pause")) => Self::Pause,
            ("set", Some("stop")) => Self::Stop,
            ("set", Some("seek")) => Self::Seek(payload(route, raw)?),
            ("set", Some("like")) => Self::Like(payload(route, raw)?),
            ("set", Some("volume")) => Self::Volume(payload(route, raw)?),
            ("set", Some("repeat")) => Self::Repeat(payload(route, raw)?),
            ("set", Some("shuffle")) => Self::Shuffle(payload(route, raw)?),
            _ => return Err(undeclared(channel, route)),
        })
    }
}
