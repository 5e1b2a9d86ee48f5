use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::player::{RepeatMode, ShuffleMode};

/// Top-level settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/reprise/config.toml` or
/// `~/.config/reprise/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `REPRISE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub playback: PlaybackSettings,
    pub state: StateSettings,
    pub log: LogSettings,
    pub mpris: MprisSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Base address of the media server, optionally with a path prefix.
    pub address: String,
    /// Bearer token sent with every stream request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user_agent: String,
    /// Timeout for fetching a stream (seconds).
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "http://localhost:9996".to_string(),
            token: None,
            user_agent: format!("reprise/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

impl ServerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Shuffle mode used when no session is restored.
    pub shuffle: ShuffleMode,
    /// Repeat mode used when no session is restored.
    pub repeat: RepeatMode,
    /// Initial volume in `[0, 1]`.
    pub volume: f64,
    /// How often progress is reported while playing (milliseconds).
    pub progress_interval_ms: u64,
    /// Whether to restore the previous session on startup.
    pub restore_session: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            shuffle: ShuffleMode::Off,
            repeat: RepeatMode::Off,
            volume: 1.0,
            progress_interval_ms: 1000,
            restore_session: true,
        }
    }
}

impl PlaybackSettings {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    /// Session file. Defaults to `$XDG_STATE_HOME/reprise/state.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `tracing` filter directives; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "reprise=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MprisSettings {
    pub enabled: bool,
}

impl Default for MprisSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}
