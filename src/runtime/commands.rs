//! Line-oriented console commands read from stdin.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::service::PlayerCommand;
use crate::error::PlaylistError;
use crate::player::{RepeatMode, ShuffleMode};
use crate::track::Track;

pub const HELP: &str = "\
commands:
  play | pause | toggle | stop | next | prev
  seek <0..1>          seek to a fraction of the track
  seek+ <ms> | seek- <ms>
  jump <index>         play the track at <index>
  vol <0..1>
  shuffle [off|queue]  toggle or set shuffle
  repeat [off|queue|track]
  load <file>          replace the playlist with a JSON track list
  append <file>        append a JSON track list
  clear                empty the playlist
  status | save | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Player(PlayerCommand),
    Load(PathBuf),
    AppendFile(PathBuf),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unknown command {0:?} (try \"help\")")]
    Unknown(String),

    #[error("{0}: missing argument")]
    MissingArgument(&'static str),

    #[error("{command}: invalid argument {value:?}")]
    InvalidArgument { command: &'static str, value: String },
}

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let arg = (!rest.is_empty()).then_some(rest);

    let cmd = match word.to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "play" => ConsoleCommand::Player(PlayerCommand::Play),
        "pause" => ConsoleCommand::Player(PlayerCommand::Pause),
        "toggle" | "pp" => ConsoleCommand::Player(PlayerCommand::PlayPause),
        "stop" => ConsoleCommand::Player(PlayerCommand::Stop),
        "next" | "n" => ConsoleCommand::Player(PlayerCommand::Next),
        "prev" | "previous" | "p" => ConsoleCommand::Player(PlayerCommand::Previous),
        "seek" => ConsoleCommand::Player(PlayerCommand::Seek(number("seek", arg)?)),
        "seek+" => ConsoleCommand::Player(PlayerCommand::SeekBy(number("seek+", arg)?)),
        "seek-" => {
            let ms: i64 = number("seek-", arg)?;
            ConsoleCommand::Player(PlayerCommand::SeekBy(-ms))
        }
        "jump" => ConsoleCommand::Player(PlayerCommand::PlayIndex(number("jump", arg)?)),
        "vol" | "volume" => ConsoleCommand::Player(PlayerCommand::SetVolume(number("vol", arg)?)),
        "shuffle" => ConsoleCommand::Player(match arg {
            None => PlayerCommand::ToggleShuffle,
            Some(v) => PlayerCommand::SetShuffle(mode::<ShuffleMode>("shuffle", v)?),
        }),
        "repeat" => ConsoleCommand::Player(match arg {
            None => PlayerCommand::ToggleRepeat,
            Some(v) => PlayerCommand::SetRepeat(mode::<RepeatMode>("repeat", v)?),
        }),
        "load" => ConsoleCommand::Load(path("load", arg)?),
        "append" => ConsoleCommand::AppendFile(path("append", arg)?),
        "clear" => ConsoleCommand::Player(PlayerCommand::SetPlaylist(Vec::new())),
        "status" => ConsoleCommand::Status,
        "save" => ConsoleCommand::Player(PlayerCommand::StoreState),
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

fn number<T: std::str::FromStr>(command: &'static str, arg: Option<&str>) -> Result<T, ParseError> {
    let value = arg.ok_or(ParseError::MissingArgument(command))?;
    value.parse().map_err(|_| ParseError::InvalidArgument {
        command,
        value: value.to_string(),
    })
}

fn mode<T: std::str::FromStr>(command: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidArgument {
        command,
        value: value.to_string(),
    })
}

fn path(command: &'static str, arg: Option<&str>) -> Result<PathBuf, ParseError> {
    arg.map(PathBuf::from)
        .ok_or(ParseError::MissingArgument(command))
}

/// Read a playlist file: a JSON array of track objects.
pub fn read_playlist(path: &Path) -> Result<Vec<Track>, PlaylistError> {
    let text = fs::read_to_string(path).map_err(|source| PlaylistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| PlaylistError::Json {
        path: path.to_path_buf(),
        source,
    })
}
