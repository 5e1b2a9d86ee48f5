//! Encoding of the player's session snapshot for the key/value store.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::types::{RepeatMode, ShuffleMode};
use crate::error::StoreError;
use crate::track::Track;

/// Store key the snapshot lives under.
pub const SESSION_KEY: &str = "player_state";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub playlist: Vec<Track>,
    pub index: Option<usize>,
    pub shuffle: ShuffleMode,
    pub repeat: RepeatMode,
    pub volume: f64,
    /// Playback position in milliseconds, when one was known.
    pub position_ms: Option<u64>,
    pub progress: Option<f64>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            playlist: Vec::new(),
            index: None,
            shuffle: ShuffleMode::Off,
            repeat: RepeatMode::Off,
            volume: 1.0,
            position_ms: None,
            progress: None,
        }
    }
}

#[derive(Serialize)]
struct Record<'a> {
    index: Option<usize>,
    playlist: &'a [Track],
    progress: Option<f64>,
    position: Option<u64>,
    shuffle: ShuffleMode,
    repeat: RepeatMode,
    volume: f64,
}

impl SessionState {
    pub fn encode(&self) -> Result<Value, StoreError> {
        let record = Record {
            index: self.index,
            playlist: &self.playlist,
            progress: self.progress.filter(|p| p.is_finite()),
            position: self.position_ms,
            shuffle: self.shuffle,
            repeat: self.repeat,
            volume: if self.volume.is_finite() {
                self.volume
            } else {
                1.0
            },
        };
        Ok(serde_json::to_value(record)?)
    }

    /// Decode a stored snapshot field by field.
    ///
    /// Returns `None` when there is nothing worth restoring: not an object,
    /// or no usable track in the playlist. Any other malformed field falls
    /// back to its default with a warning.
    pub fn decode(value: &Value) -> Option<Self> {
        let Some(obj) = value.as_object() else {
            warn!("stored session is not an object; ignoring it");
            return None;
        };

        let playlist = decode_playlist(obj);
        if playlist.is_empty() {
            return None;
        }

        let defaults = Self::default();
        let index = match obj.get("index") {
            None | Some(Value::Null) => None,
            Some(v) => match v.as_u64() {
                Some(i) => usize::try_from(i).ok(),
                None => {
                    warn!("stored session index {v} is not an index; using the first track");
                    None
                }
            },
        };

        let shuffle = field(obj, "shuffle").unwrap_or(defaults.shuffle);
        let repeat = field(obj, "repeat").unwrap_or(defaults.repeat);
        let volume = field::<f64>(obj, "volume")
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(defaults.volume);
        let position_ms = field(obj, "position");
        let progress = field::<f64>(obj, "progress")
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 1.0));

        Some(Self {
            playlist,
            index,
            shuffle,
            repeat,
            volume,
            position_ms,
            progress,
        })
    }
}

fn decode_playlist(obj: &Map<String, Value>) -> Vec<Track> {
    let Some(items) = obj.get("playlist").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<Track>(item.clone()) {
            Ok(track) => Some(track),
            Err(e) => {
                warn!("dropping stored playlist entry {i}: {e}");
                None
            }
        })
        .collect()
}

/// A present, non-null field of the right type; anything else is logged.
fn field<T: serde::de::DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Option<T> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("ignoring stored session field {key:?}: {e}");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_the_documented_record() {
        let state = SessionState {
            playlist: vec![Track::new("1").with_title("One")],
            index: Some(0),
            shuffle: ShuffleMode::Queue,
            repeat: RepeatMode::Track,
            volume: 0.8,
            position_ms: Some(61_000),
            progress: Some(0.25),
        };
        assert_eq!(
            state.encode().unwrap(),
            json!({
                "index": 0,
                "playlist": [{"id": "1", "title": "One"}],
                "progress": 0.25,
                "position": 61000,
                "shuffle": "queue",
                "repeat": "track",
                "volume": 0.8,
            })
        );
    }

    #[test]
    fn decodes_what_it_encodes() {
        let state = SessionState {
            playlist: vec![Track::new("a"), Track::new("b")],
            index: Some(1),
            shuffle: ShuffleMode::Off,
            repeat: RepeatMode::Queue,
            volume: 0.3,
            position_ms: None,
            progress: None,
        };
        assert_eq!(SessionState::decode(&state.encode().unwrap()), Some(state));
    }

    #[test]
    fn empty_or_missing_playlist_means_nothing_to_restore() {
        assert_eq!(SessionState::decode(&json!({"index": 0, "playlist": []})), None);
        assert_eq!(SessionState::decode(&json!({"index": 0})), None);
        assert_eq!(SessionState::decode(&json!("garbage")), None);
        assert_eq!(SessionState::decode(&json!({"playlist": [{"title": "no id"}]})), None);
    }

    #[test]
    fn malformed_fields_fall_back_to_defaults() {
        let decoded = SessionState::decode(&json!({
            "playlist": [{"id": 7}, {"nope": true}],
            "index": "two",
            "shuffle": "sideways",
            "repeat": "all",
            "volume": 4.0,
            "position": -5,
            "progress": "half",
        }))
        .unwrap();

        assert_eq!(decoded.playlist, vec![Track::new("7")]);
        assert_eq!(decoded.index, None);
        assert_eq!(decoded.shuffle, ShuffleMode::Off);
        assert_eq!(decoded.repeat, RepeatMode::Queue);
        assert_eq!(decoded.volume, 1.0);
        assert_eq!(decoded.position_ms, None);
        assert_eq!(decoded.progress, None);
    }

    #[test]
    fn records_without_modes_use_defaults() {
        let decoded = SessionState::decode(&json!({
            "playlist": [{"id": "x"}],
            "index": 0,
            "progress": null,
            "position": null,
        }))
        .unwrap();
        assert_eq!(decoded.shuffle, ShuffleMode::Off);
        assert_eq!(decoded.repeat, RepeatMode::Off);
        assert_eq!(decoded.volume, 1.0);
    }
}
