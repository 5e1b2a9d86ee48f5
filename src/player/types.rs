//! Small value types shared by the player, its session codec and the
//! outer surfaces (console, MPRIS, config).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    #[default]
    #[serde(alias = "none", alias = "false")]
    Off,
    /// Pick a random track of the playlist on every advance.
    #[serde(alias = "on", alias = "true", alias = "all")]
    Queue,
}

impl ShuffleMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Off => Self::Queue,
            Self::Queue => Self::Off,
        }
    }

    pub fn is_on(self) -> bool {
        self == Self::Queue
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last track.
    #[default]
    #[serde(alias = "none")]
    Off,
    /// Wrap around to the first track after the last.
    #[serde(alias = "all", alias = "playlist")]
    Queue,
    /// Replay the current track when it ends.
    #[serde(alias = "one", alias = "song")]
    Track,
}

impl RepeatMode {
    /// Off -> Queue -> Track -> Off.
    pub fn cycled(self) -> Self {
        match self {
            Self::Off => Self::Queue,
            Self::Queue => Self::Track,
            Self::Track => Self::Off,
        }
    }
}

impl fmt::Display for ShuffleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Queue => "queue",
        })
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Queue => "queue",
            Self::Track => "track",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mode {0:?}")]
pub struct UnknownMode(pub String);

impl FromStr for ShuffleMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "false" => Ok(Self::Off),
            "queue" | "on" | "true" | "all" => Ok(Self::Queue),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

impl FromStr for RepeatMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "queue" | "all" | "playlist" => Ok(Self::Queue),
            "track" | "one" | "song" => Ok(Self::Track),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

/// Coarse player state as seen from outside.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlayerState {
    /// Empty playlist.
    Idle,
    /// A playlist and a current index, but no pipeline.
    Ready,
    Playing,
    Paused,
}

/// Notifications queued by the player for its owner to dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    PlaylistChanged,
    StateChanged,
    TrackChanged,
    /// Fraction of the current track played, in `[0, 1]`.
    Progress(f64),
    RepeatChanged(RepeatMode),
    ShuffleChanged(ShuffleMode),
    VolumeChanged(f64),
    Seeked { position_ms: u64 },
}

/// A seek requested before the stream could honor it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PendingSeek {
    Position(Duration),
    /// Resolved against the duration once the stream has started.
    Fraction(f64),
}
