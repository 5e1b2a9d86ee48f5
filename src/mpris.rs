use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::time::Duration;

use async_io::{Timer, block_on};
use tracing::{debug, info, warn};
use zbus::object_server::{InterfaceRef, SignalEmitter};
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedValue, Value};

use crate::player::{PlayerEvent, PlayerState, RepeatMode, ShuffleMode};
use crate::runtime::{ConsoleCommand, PlayerCommand, PlayerHandle, PlayerSnapshot};

const BUS_NAME: &str = "org.mpris.MediaPlayer2.reprise";
const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const EVENT_POLL: Duration = Duration::from_millis(100);

struct RootIface {
    quit: Sender<ConsoleCommand>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // No window to raise.
    }

    fn quit(&self) {
        let _ = self.quit.send(ConsoleCommand::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "reprise"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec![]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    player: PlayerHandle,
}

impl PlayerIface {
    fn snapshot(&self) -> PlayerSnapshot {
        self.player.snapshot()
    }
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        self.player.send(PlayerCommand::Next);
    }

    fn previous(&self) {
        self.player.send(PlayerCommand::Previous);
    }

    fn play(&self) {
        self.player.send(PlayerCommand::Play);
    }

    fn pause(&self) {
        self.player.send(PlayerCommand::Pause);
    }

    fn play_pause(&self) {
        self.player.send(PlayerCommand::PlayPause);
    }

    fn stop(&self) {
        self.player.send(PlayerCommand::Stop);
    }

    /// Relative seek, `offset` in microseconds.
    fn seek(&self, offset: i64) {
        self.player.send(PlayerCommand::SeekBy(offset / 1000));
    }

    /// Absolute seek, ignored unless `track_id` is still the current track.
    fn set_position(&self, track_id: ObjectPath<'_>, position: i64) {
        let s = self.snapshot();
        let Some(index) = s.track_index else {
            return;
        };
        if track_id.as_str() != track_object_path(index) {
            debug!("MPRIS SetPosition for stale track {track_id}");
            return;
        }
        let Some(duration_ms) = s.duration_ms.filter(|&d| d > 0) else {
            return;
        };
        if position < 0 || position / 1000 > duration_ms as i64 {
            return;
        }
        let fraction = (position / 1000) as f64 / duration_ms as f64;
        self.player.send(PlayerCommand::Seek(fraction));
    }

    #[zbus(signal)]
    async fn seeked(emitter: &SignalEmitter<'_>, position: i64) -> zbus::Result<()>;

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        playback_status(self.snapshot().state)
    }

    #[zbus(property)]
    fn loop_status(&self) -> &str {
        loop_status(self.snapshot().repeat)
    }

    #[zbus(property)]
    fn set_loop_status(&mut self, value: String) {
        match parse_loop_status(&value) {
            Some(mode) => {
                self.player.send(PlayerCommand::SetRepeat(mode));
            }
            None => warn!("MPRIS: unknown LoopStatus {value:?}"),
        }
    }

    #[zbus(property)]
    fn shuffle(&self) -> bool {
        self.snapshot().shuffle.is_on()
    }

    #[zbus(property)]
    fn set_shuffle(&mut self, value: bool) {
        let mode = if value {
            ShuffleMode::Queue
        } else {
            ShuffleMode::Off
        };
        self.player.send(PlayerCommand::SetShuffle(mode));
    }

    #[zbus(property)]
    fn volume(&self) -> f64 {
        self.snapshot().volume
    }

    #[zbus(property)]
    fn set_volume(&mut self, value: f64) {
        self.player.send(PlayerCommand::SetVolume(value));
    }

    /// Microseconds into the current track.
    #[zbus(property)]
    fn position(&self) -> i64 {
        self.snapshot()
            .position_ms
            .map(|ms| ms as i64 * 1000)
            .unwrap_or(0)
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn minimum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn maximum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        self.snapshot().is_active
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        self.snapshot().is_active
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        self.snapshot().is_active
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        self.snapshot().has_next
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        self.snapshot().has_previous
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        metadata(&self.snapshot())
    }
}

fn playback_status(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Idle | PlayerState::Ready => "Stopped",
        PlayerState::Playing => "Playing",
        PlayerState::Paused => "Paused",
    }
}

fn loop_status(repeat: RepeatMode) -> &'static str {
    match repeat {
        RepeatMode::Off => "None",
        RepeatMode::Queue => "Playlist",
        RepeatMode::Track => "Track",
    }
}

fn parse_loop_status(value: &str) -> Option<RepeatMode> {
    match value {
        "None" => Some(RepeatMode::Off),
        "Playlist" => Some(RepeatMode::Queue),
        "Track" => Some(RepeatMode::Track),
        _ => None,
    }
}

fn track_object_path(index: usize) -> String {
    format!("/org/mpris/MediaPlayer2/track/{index}")
}

fn metadata(s: &PlayerSnapshot) -> HashMap<String, OwnedValue> {
    let mut map = HashMap::new();
    let (Some(index), Some(track)) = (s.track_index, s.track.as_ref()) else {
        return map;
    };

    let mut put = |key: &str, value: Value<'_>| {
        if let Ok(v) = OwnedValue::try_from(value) {
            map.insert(key.to_string(), v);
        }
    };

    if let Ok(path) = ObjectPath::try_from(track_object_path(index)) {
        put("mpris:trackid", Value::from(path));
    }
    put("xesam:title", Value::from(track.display()));
    if let Some(artist) = track.artist.clone() {
        put("xesam:artist", Value::from(vec![artist]));
    }
    if let Some(album) = track.album.clone() {
        put("xesam:album", Value::from(album));
    }
    let length_ms = s.duration_ms.or(track.duration);
    if let Some(ms) = length_ms {
        put("mpris:length", Value::from(ms as i64 * 1000));
    }
    map
}

/// Serve the MPRIS interfaces on the session bus from a background thread.
/// Failing to reach the bus only disables the bridge.
pub fn spawn_mpris(player: PlayerHandle, quit: Sender<ConsoleCommand>) {
    let events = player.subscribe();
    let spawned = std::thread::Builder::new()
        .name("mpris".into())
        .spawn(move || {
            block_on(async move {
                if let Err(e) = serve(player, quit, events).await {
                    warn!("MPRIS bridge unavailable: {e}");
                }
            });
        });
    if let Err(e) = spawned {
        warn!("MPRIS: failed to spawn thread: {e}");
    }
}

async fn serve(
    player: PlayerHandle,
    quit: Sender<ConsoleCommand>,
    events: Receiver<PlayerEvent>,
) -> zbus::Result<()> {
    let connection = Connection::session().await?;
    connection.request_name(BUS_NAME).await?;

    let object_server = connection.object_server();
    object_server.at(OBJECT_PATH, RootIface { quit }).await?;
    object_server.at(OBJECT_PATH, PlayerIface { player }).await?;
    let iface = object_server
        .interface::<_, PlayerIface>(OBJECT_PATH)
        .await?;
    info!("MPRIS bridge registered as {BUS_NAME}");

    loop {
        loop {
            match events.try_recv() {
                Ok(event) => {
                    if let Err(e) = announce(&iface, &event).await {
                        debug!("MPRIS: failed to signal {event:?}: {e}");
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
        Timer::after(EVENT_POLL).await;
    }
}

/// Emit the D-Bus signals matching one player event.
async fn announce(iface: &InterfaceRef<PlayerIface>, event: &PlayerEvent) -> zbus::Result<()> {
    let emitter = iface.signal_emitter();
    let player = iface.get().await;
    match event {
        PlayerEvent::Progress(_) => {}
        PlayerEvent::Seeked { position_ms } => {
            PlayerIface::seeked(emitter, *position_ms as i64 * 1000).await?;
        }
        PlayerEvent::VolumeChanged(_) => player.volume_changed(emitter).await?,
        PlayerEvent::ShuffleChanged(_) => {
            player.shuffle_changed(emitter).await?;
            player.can_go_next_changed(emitter).await?;
            player.can_go_previous_changed(emitter).await?;
        }
        PlayerEvent::RepeatChanged(_) => {
            player.loop_status_changed(emitter).await?;
            player.can_go_next_changed(emitter).await?;
        }
        PlayerEvent::PlaylistChanged | PlayerEvent::StateChanged | PlayerEvent::TrackChanged => {
            player.playback_status_changed(emitter).await?;
            player.metadata_changed(emitter).await?;
            player.can_go_next_changed(emitter).await?;
            player.can_go_previous_changed(emitter).await?;
            player.can_play_changed(emitter).await?;
            player.can_pause_changed(emitter).await?;
            player.can_seek_changed(emitter).await?;
        }
    }
    Ok(())
}
