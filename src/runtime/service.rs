//! The player thread and the handle other threads use to talk to it.
//!
//! The `Player` lives on one thread for its whole life. Commands, pipeline
//! events and subscriptions all arrive through one channel, so they are
//! applied strictly one after another; progress sampling piggybacks on the
//! receive timeout.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rodio::OutputStreamBuilder;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::PipelineError;
use crate::pipeline::{EventSink, PipelineEvent, RodioFactory};
use crate::player::{Player, PlayerEvent, PlayerState, RepeatMode, ShuffleMode};
use crate::resolver::ServiceResolver;
use crate::store::SessionStore;
use crate::track::Track;

/// How long the loop sleeps when no progress tick is pending.
const IDLE_WAIT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    SetPlaylist(Vec<Track>),
    Append(Vec<Track>),
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
    PlayIndex(usize),
    /// Fraction of the current track.
    Seek(f64),
    /// Relative offset in milliseconds.
    SeekBy(i64),
    SetVolume(f64),
    SetShuffle(ShuffleMode),
    SetRepeat(RepeatMode),
    ToggleShuffle,
    ToggleRepeat,
    StoreState,
}

impl PlayerCommand {
    fn apply(self, player: &mut Player, store: &mut dyn SessionStore) {
        match self {
            Self::SetPlaylist(tracks) => player.set_playlist(tracks),
            Self::Append(tracks) => player.append(tracks),
            Self::Play => player.play(),
            Self::Pause => player.pause(),
            Self::PlayPause => player.toggle_play(),
            Self::Stop => player.stop(),
            Self::Next => player.next(),
            Self::Previous => player.previous(),
            Self::PlayIndex(i) => player.play_index(i),
            Self::Seek(fraction) => player.seek(fraction),
            Self::SeekBy(offset_ms) => player.seek_by(offset_ms),
            Self::SetVolume(v) => player.set_volume(v),
            Self::SetShuffle(mode) => player.set_shuffle(mode),
            Self::SetRepeat(mode) => player.set_repeat(mode),
            Self::ToggleShuffle => player.toggle_shuffle(),
            Self::ToggleRepeat => player.toggle_repeat(),
            Self::StoreState => {
                if player.store_state(store) {
                    info!("session saved");
                }
            }
        }
    }
}

pub(crate) enum PlayerMsg {
    Command(PlayerCommand),
    Pipeline(PipelineEvent),
    Subscribe(Sender<PlayerEvent>),
    Shutdown,
}

/// Read-only copy of the player's observable state, refreshed by the player
/// thread whenever the player announces a change.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub state: PlayerState,
    pub track_index: Option<usize>,
    pub track: Option<Track>,
    pub playlist_len: usize,
    pub shuffle: ShuffleMode,
    pub repeat: RepeatMode,
    pub volume: f64,
    pub position_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub progress: Option<f64>,
    pub has_next: bool,
    pub has_previous: bool,
    pub is_active: bool,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            state: PlayerState::Idle,
            track_index: None,
            track: None,
            playlist_len: 0,
            shuffle: ShuffleMode::Off,
            repeat: RepeatMode::Off,
            volume: 1.0,
            position_ms: None,
            duration_ms: None,
            progress: None,
            has_next: false,
            has_previous: false,
            is_active: false,
        }
    }
}

impl PlayerSnapshot {
    pub fn capture(player: &Player) -> Self {
        Self {
            state: player.state(),
            track_index: player.track_index(),
            track: player.track_info(),
            playlist_len: player.playlist_len(),
            shuffle: player.shuffle(),
            repeat: player.repeat(),
            volume: player.volume(),
            position_ms: player.position(),
            duration_ms: player.duration().map(|d| d.as_millis() as u64),
            progress: player.progress(),
            has_next: player.has_next(),
            has_previous: player.has_previous(),
            is_active: player.is_active(),
        }
    }
}

/// Cloneable front door to the player thread.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: Sender<PlayerMsg>,
    snapshot: Arc<Mutex<PlayerSnapshot>>,
}

impl PlayerHandle {
    /// Queue a command. Returns false once the player thread is gone.
    pub fn send(&self, cmd: PlayerCommand) -> bool {
        self.tx.send(PlayerMsg::Command(cmd)).is_ok()
    }

    /// Receive every event the player emits from now on.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = mpsc::channel();
        let _ = self.tx.send(PlayerMsg::Subscribe(tx));
        rx
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        match self.snapshot.lock() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// A handle wired to a bare channel, for driving `run_loop` by hand.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, Receiver<PlayerMsg>, Arc<Mutex<PlayerSnapshot>>) {
        let (tx, rx) = mpsc::channel();
        let snapshot = Arc::new(Mutex::new(PlayerSnapshot::default()));
        (
            Self {
                tx,
                snapshot: snapshot.clone(),
            },
            rx,
            snapshot,
        )
    }
}

pub struct PlayerService {
    handle: PlayerHandle,
    thread: JoinHandle<()>,
}

impl PlayerService {
    /// Start the player thread with the production pipeline backend.
    ///
    /// Blocks until the audio output is open, so a missing device is reported
    /// here rather than on the first `play`.
    pub fn spawn(
        settings: &Settings,
        mut store: Box<dyn SessionStore + Send>,
    ) -> Result<Self, PipelineError> {
        let (tx, rx) = mpsc::channel::<PlayerMsg>();
        let snapshot = Arc::new(Mutex::new(PlayerSnapshot::default()));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), PipelineError>>();

        let settings = settings.clone();
        let events_tx = tx.clone();
        let snapshot_for_thread = snapshot.clone();

        let thread = thread::Builder::new()
            .name("player".into())
            .spawn(move || {
                let mut stream = match OutputStreamBuilder::open_default_stream() {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(PipelineError::Output(e.to_string())));
                        return;
                    }
                };
                // rodio logs to stderr when the stream is dropped; we log ourselves.
                stream.log_on_drop(false);

                let factory = match RodioFactory::new(
                    stream.mixer().clone(),
                    &settings.server.user_agent,
                    settings.server.timeout(),
                ) {
                    Ok(f) => f,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let resolver = ServiceResolver::new(
                    settings.server.address.clone(),
                    settings.server.token.clone(),
                );
                let sink = EventSink::new(move |event| {
                    let _ = events_tx.send(PlayerMsg::Pipeline(event));
                });

                let mut player = Player::new(Box::new(factory), Box::new(resolver), sink)
                    .with_progress_interval(settings.playback.progress_interval());
                player.set_shuffle(settings.playback.shuffle);
                player.set_repeat(settings.playback.repeat);
                player.set_volume(settings.playback.volume);
                if settings.playback.restore_session {
                    player.restore_state(store.as_ref());
                }

                let _ = ready_tx.send(Ok(()));
                run_loop(player, rx, store.as_mut(), &snapshot_for_thread);
                debug!("player thread finished");
            })
            .map_err(|e| PipelineError::Output(format!("failed to spawn player thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                handle: PlayerHandle { tx, snapshot },
                thread,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(PipelineError::Output("player thread exited during startup".into())),
        }
    }

    pub fn handle(&self) -> PlayerHandle {
        self.handle.clone()
    }

    /// Save the session, stop playback and wait for the thread to finish.
    pub fn shutdown(self) {
        let _ = self.handle.tx.send(PlayerMsg::Shutdown);
        if self.thread.join().is_err() {
            error!("player thread panicked");
        }
    }
}

/// Drive `player` until a shutdown message arrives or every sender is gone,
/// then save the session and stop. The production pipeline sink holds a
/// sender of its own, so there only `Shutdown` ends the loop.
pub(crate) fn run_loop(
    mut player: Player,
    rx: Receiver<PlayerMsg>,
    store: &mut dyn SessionStore,
    snapshot: &Mutex<PlayerSnapshot>,
) {
    let mut subscribers: Vec<Sender<PlayerEvent>> = Vec::new();
    refresh(&player, snapshot);
    publish(&mut player, snapshot, &mut subscribers);

    loop {
        let wait = player
            .progress_deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);

        match rx.recv_timeout(wait) {
            Ok(PlayerMsg::Command(cmd)) => {
                debug!("command {cmd:?}");
                cmd.apply(&mut player, store);
            }
            Ok(PlayerMsg::Pipeline(event)) => player.handle_pipeline_event(event),
            Ok(PlayerMsg::Subscribe(tx)) => subscribers.push(tx),
            Ok(PlayerMsg::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("every player handle is gone");
                break;
            }
        }

        player.poll_progress(Instant::now());
        publish(&mut player, snapshot, &mut subscribers);
    }

    player.store_state(store);
    player.stop();
    publish(&mut player, snapshot, &mut subscribers);
    info!("player shut down");
}

/// Refresh the snapshot, then hand the queued events to every subscriber.
fn publish(
    player: &mut Player,
    snapshot: &Mutex<PlayerSnapshot>,
    subscribers: &mut Vec<Sender<PlayerEvent>>,
) {
    let events = player.drain_events();
    if events.is_empty() {
        return;
    }
    refresh(player, snapshot);
    subscribers.retain(|tx| events.iter().all(|e| tx.send(e.clone()).is_ok()));
}

fn refresh(player: &Player, snapshot: &Mutex<PlayerSnapshot>) {
    let fresh = PlayerSnapshot::capture(player);
    match snapshot.lock() {
        Ok(mut s) => *s = fresh,
        Err(poisoned) => *poisoned.into_inner() = fresh,
    }
}

#[cfg(test)]
mod tests;
