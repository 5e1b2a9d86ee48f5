//! The stdin console: reading lines, running commands, printing status.

use std::io::{self, BufRead};
use std::path::Path;
use std::sync::mpsc::Sender;
use std::thread;

use tracing::{debug, info, warn};

use super::commands::{self, ConsoleCommand, HELP};
use super::service::{PlayerCommand, PlayerHandle, PlayerSnapshot};
use crate::player::{PlayerEvent, PlayerState};

/// Forward parsed stdin lines to `tx`. End of input counts as `quit`.
pub fn spawn_stdin_reader(tx: Sender<ConsoleCommand>) {
    let spawned = thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match commands::parse(&line) {
                    Ok(Some(cmd)) => {
                        let quit = cmd == ConsoleCommand::Quit;
                        if tx.send(cmd).is_err() || quit {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            let _ = tx.send(ConsoleCommand::Quit);
        });
    if let Err(e) = spawned {
        warn!("failed to start console reader: {e}");
    }
}

/// Run one console command. Returns false when the console should exit.
pub fn dispatch(cmd: ConsoleCommand, player: &PlayerHandle) -> bool {
    match cmd {
        ConsoleCommand::Player(cmd) => {
            player.send(cmd);
        }
        ConsoleCommand::Load(path) => {
            if let Some(tracks) = load(&path) {
                player.send(PlayerCommand::SetPlaylist(tracks));
                player.send(PlayerCommand::Play);
            }
        }
        ConsoleCommand::AppendFile(path) => {
            if let Some(tracks) = load(&path) {
                player.send(PlayerCommand::Append(tracks));
            }
        }
        ConsoleCommand::Status => println!("{}", format_status(&player.snapshot())),
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return false,
    }
    true
}

fn load(path: &Path) -> Option<Vec<crate::track::Track>> {
    match commands::read_playlist(path) {
        Ok(tracks) => {
            info!("read {} tracks from {}", tracks.len(), path.display());
            Some(tracks)
        }
        Err(e) => {
            warn!("{e}");
            None
        }
    }
}

/// Log what the player announces, for a console without any other display.
pub fn spawn_event_log(player: &PlayerHandle) {
    let events = player.subscribe();
    let player = player.clone();
    let spawned = thread::Builder::new()
        .name("event-log".into())
        .spawn(move || {
            for event in events {
                match event {
                    PlayerEvent::TrackChanged => {
                        let s = player.snapshot();
                        if let Some(track) = s.track {
                            info!(
                                "now at {}/{}: {}",
                                s.track_index.map_or(0, |i| i + 1),
                                s.playlist_len,
                                track.display()
                            );
                        }
                    }
                    PlayerEvent::StateChanged => {
                        debug!("state: {}", state_label(player.snapshot().state));
                    }
                    PlayerEvent::Progress(_) => {}
                    other => debug!("{other:?}"),
                }
            }
        });
    if let Err(e) = spawned {
        warn!("failed to start event log: {e}");
    }
}

fn state_label(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Idle => "idle",
        PlayerState::Ready => "stopped",
        PlayerState::Playing => "playing",
        PlayerState::Paused => "paused",
    }
}

fn clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// One-line summary, e.g. `playing 2/5 Artist - Title 1:02/3:45 shuffle=off repeat=queue vol=80%`.
pub fn format_status(s: &PlayerSnapshot) -> String {
    let mut out = state_label(s.state).to_string();
    if let (Some(i), Some(track)) = (s.track_index, s.track.as_ref()) {
        out.push_str(&format!(" {}/{} {}", i + 1, s.playlist_len, track.display()));
    }
    match (s.position_ms, s.duration_ms) {
        (Some(pos), Some(dur)) => out.push_str(&format!(" {}/{}", clock(pos), clock(dur))),
        (Some(pos), None) => out.push_str(&format!(" {}", clock(pos))),
        _ => {}
    }
    out.push_str(&format!(
        " shuffle={} repeat={} vol={:.0}%",
        s.shuffle,
        s.repeat,
        s.volume * 100.0
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{RepeatMode, ShuffleMode};
    use crate::runtime::PlayerMsg;
    use crate::track::Track;

    #[test]
    fn status_line_for_an_idle_player() {
        assert_eq!(
            format_status(&PlayerSnapshot::default()),
            "idle shuffle=off repeat=off vol=100%"
        );
    }

    #[test]
    fn status_line_while_playing() {
        let s = PlayerSnapshot {
            state: PlayerState::Playing,
            track_index: Some(1),
            track: Some(Track::new("9").with_title("Title").with_artist("Artist")),
            playlist_len: 5,
            shuffle: ShuffleMode::Off,
            repeat: RepeatMode::Queue,
            volume: 0.8,
            position_ms: Some(62_000),
            duration_ms: Some(225_000),
            ..PlayerSnapshot::default()
        };
        assert_eq!(
            format_status(&s),
            "playing 2/5 Artist - Title 1:02/3:45 shuffle=off repeat=queue vol=80%"
        );
    }

    #[test]
    fn dispatch_forwards_and_stops_on_quit() {
        let (handle, rx, _snapshot) = PlayerHandle::detached();

        assert!(dispatch(ConsoleCommand::Player(PlayerCommand::Next), &handle));
        assert!(dispatch(
            ConsoleCommand::Load("/definitely/not/here.json".into()),
            &handle
        ));
        assert!(!dispatch(ConsoleCommand::Quit, &handle));

        let sent: Vec<_> = rx
            .try_iter()
            .filter_map(|m| match m {
                PlayerMsg::Command(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(sent, vec![PlayerCommand::Next]);
    }

    #[test]
    fn load_replaces_the_playlist_and_plays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(&path, r#"[{"id": "a"}, {"id": "b"}]"#).unwrap();
        let (handle, rx, _snapshot) = PlayerHandle::detached();

        dispatch(ConsoleCommand::Load(path), &handle);

        let sent: Vec<_> = rx
            .try_iter()
            .filter_map(|m| match m {
                PlayerMsg::Command(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(
            sent,
            vec![
                PlayerCommand::SetPlaylist(vec![Track::new("a"), Track::new("b")]),
                PlayerCommand::Play,
            ]
        );
    }
}
