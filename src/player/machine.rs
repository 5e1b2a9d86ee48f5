//! The player state machine.
//!
//! `Player` owns the playlist, the current index, the playback settings and
//! at most one pipeline. It is driven from a single thread: commands are
//! plain method calls, pipeline events come back through
//! `handle_pipeline_event`, and progress sampling is polled by the owner's
//! loop. Nothing here returns an error; bad requests are logged and ignored.

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use super::progress::{self, ProgressSampler, Tick};
use super::session::{SESSION_KEY, SessionState};
use super::transition;
use super::types::{PendingSeek, PlayerEvent, PlayerState, RepeatMode, ShuffleMode};
use crate::pipeline::{
    EventSink, FailedPipeline, PipelineEvent, PipelineEventKind, PipelineFactory, PipelineHandle,
    PipelineId, PipelineState,
};
use crate::resolver::StreamResolver;
use crate::store::SessionStore;
use crate::track::Track;

struct ActivePipeline {
    id: PipelineId,
    handle: Box<dyn PipelineHandle>,
    /// Last state requested from the pipeline, `Paused` or `Playing`.
    state: PipelineState,
    /// Set once the stream reported it started; seeks go straight through after that.
    started: bool,
    pending_seek: Option<PendingSeek>,
}

pub struct Player {
    factory: Box<dyn PipelineFactory>,
    resolver: Box<dyn StreamResolver>,
    events: EventSink,

    playlist: Vec<Track>,
    index: Option<usize>,
    shuffle: ShuffleMode,
    repeat: RepeatMode,
    volume: f64,

    pipeline: Option<ActivePipeline>,
    next_pipeline_id: u64,
    sampler: ProgressSampler,
    rng: StdRng,
    consecutive_faults: usize,

    outbox: Vec<PlayerEvent>,
}

impl Player {
    /// `events` is handed to every pipeline the player creates; whatever it
    /// receives must eventually be fed back into `handle_pipeline_event` on
    /// the player's own thread.
    pub fn new(
        factory: Box<dyn PipelineFactory>,
        resolver: Box<dyn StreamResolver>,
        events: EventSink,
    ) -> Self {
        Self {
            factory,
            resolver,
            events,
            playlist: Vec::new(),
            index: None,
            shuffle: ShuffleMode::Off,
            repeat: RepeatMode::Off,
            volume: 1.0,
            pipeline: None,
            next_pipeline_id: 1,
            sampler: ProgressSampler::default(),
            rng: StdRng::from_entropy(),
            consecutive_faults: 0,
            outbox: Vec::new(),
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.sampler = ProgressSampler::new(interval);
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    // ---- playlist -------------------------------------------------------

    pub fn set_playlist(&mut self, tracks: Vec<Track>) {
        self.teardown();
        self.index = if tracks.is_empty() { None } else { Some(0) };
        self.playlist = tracks;
        self.consecutive_faults = 0;
        debug!("playlist replaced with {} tracks", self.playlist.len());
        self.emit(PlayerEvent::PlaylistChanged);
        self.emit(PlayerEvent::StateChanged);
    }

    pub fn append(&mut self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            debug!("append with no tracks ignored");
            return;
        }
        self.playlist.extend(tracks);
        if self.index.is_none() {
            self.index = Some(0);
        }
        self.emit(PlayerEvent::PlaylistChanged);
        self.emit(PlayerEvent::StateChanged);
    }

    // ---- transport ------------------------------------------------------

    pub fn play(&mut self) {
        if self.playlist.is_empty() {
            warn!("play requested with an empty playlist");
            return;
        }
        if self.pipeline.is_none() {
            self.load_current();
        }
        let Some(p) = self.pipeline.as_mut() else {
            return;
        };
        p.handle.set_state(PipelineState::Playing);
        p.state = PipelineState::Playing;
        self.emit(PlayerEvent::StateChanged);
        self.sampler.start(Instant::now());
    }

    pub fn pause(&mut self) {
        let Some(p) = self.pipeline.as_mut() else {
            warn!("pause requested with no active pipeline");
            return;
        };
        p.handle.set_state(PipelineState::Paused);
        p.state = PipelineState::Paused;
        self.sampler.cancel();
        self.emit(PlayerEvent::StateChanged);
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn stop(&mut self) {
        if self.teardown() {
            self.emit(PlayerEvent::StateChanged);
        }
    }

    pub fn next(&mut self) {
        let next = transition::next_index(
            self.playlist.len(),
            self.index,
            self.shuffle,
            self.repeat,
            &mut self.rng,
        );
        match next {
            Some(i) => self.jump_to(i),
            None => debug!("no next track"),
        }
    }

    pub fn previous(&mut self) {
        match transition::previous_index(self.playlist.len(), self.index, self.shuffle) {
            Some(i) => self.jump_to(i),
            None => debug!("no previous track"),
        }
    }

    pub fn play_index(&mut self, index: usize) {
        if index >= self.playlist.len() {
            warn!(
                "track {index} is outside the playlist ({} tracks)",
                self.playlist.len()
            );
            return;
        }
        self.jump_to(index);
    }

    /// Seek to `fraction` of the current track.
    pub fn seek(&mut self, fraction: f64) {
        if fraction.is_nan() {
            warn!("seek to NaN ignored");
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        let Some(p) = self.pipeline.as_mut() else {
            warn!("seek requested with no active pipeline");
            return;
        };
        if !p.started {
            debug!("stream not started yet; deferring seek to {fraction:.3}");
            p.pending_seek = Some(PendingSeek::Fraction(fraction));
            return;
        }
        let Some(duration) = p.handle.query_duration() else {
            warn!("seek ignored: duration unknown");
            return;
        };
        self.seek_to(duration.mul_f64(fraction));
    }

    /// Seek relative to the current position. Running past the end of the
    /// track moves on as `next` would.
    pub fn seek_by(&mut self, offset_ms: i64) {
        let Some(p) = self.pipeline.as_ref() else {
            warn!("relative seek requested with no active pipeline");
            return;
        };
        if !p.started {
            warn!("relative seek ignored: stream not started");
            return;
        }
        let Some(position) = p.handle.query_position() else {
            warn!("relative seek ignored: position unknown");
            return;
        };

        let target = (position.as_millis() as i128 + offset_ms as i128).max(0) as u64;
        let target = Duration::from_millis(target);
        match p.handle.query_duration() {
            Some(duration) if target >= duration => {
                debug!("relative seek ran past the end of the track");
                self.next();
            }
            _ => self.seek_to(target),
        }
    }

    pub fn set_volume(&mut self, volume: f64) {
        if volume.is_nan() {
            warn!("volume NaN ignored");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.volume = volume;
        if let Some(p) = self.pipeline.as_mut() {
            p.handle.set_volume(volume);
        }
        self.emit(PlayerEvent::VolumeChanged(volume));
    }

    pub fn set_shuffle(&mut self, shuffle: ShuffleMode) {
        self.shuffle = shuffle;
        self.emit(PlayerEvent::ShuffleChanged(shuffle));
    }

    pub fn toggle_shuffle(&mut self) {
        self.set_shuffle(self.shuffle.toggled());
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
        self.emit(PlayerEvent::RepeatChanged(repeat));
    }

    pub fn toggle_repeat(&mut self) {
        self.set_repeat(self.repeat.cycled());
    }

    // ---- pipeline events ------------------------------------------------

    pub fn handle_pipeline_event(&mut self, event: PipelineEvent) {
        let current = self.pipeline.as_ref().map(|p| p.id);
        if current != Some(event.id) {
            debug!("dropping {:?} from stale pipeline {}", event.kind, event.id);
            return;
        }

        match event.kind {
            PipelineEventKind::StreamStarted => self.on_stream_started(),
            PipelineEventKind::EndOfStream => {
                debug!("end of stream on pipeline {}", event.id);
                self.advance(false);
            }
            PipelineEventKind::Error(message) => {
                warn!("pipeline {} failed: {message}", event.id);
                self.consecutive_faults += 1;
                self.advance(true);
            }
        }
    }

    fn on_stream_started(&mut self) {
        self.consecutive_faults = 0;
        let Some(p) = self.pipeline.as_mut() else {
            return;
        };
        p.started = true;
        let Some(pending) = p.pending_seek.take() else {
            return;
        };

        let target = match pending {
            PendingSeek::Position(position) => Some(position),
            PendingSeek::Fraction(fraction) => {
                p.handle.query_duration().map(|d| d.mul_f64(fraction))
            }
        };
        match target {
            Some(target) => self.seek_to(target),
            None => warn!("deferred seek dropped: duration unknown"),
        }
    }

    /// Move on after the current track ended or failed.
    fn advance(&mut self, fault: bool) {
        let playing = self
            .pipeline
            .as_ref()
            .is_some_and(|p| p.state == PipelineState::Playing);
        if fault && !playing {
            debug!("track {:?} failed before playback was requested", self.index);
            self.consecutive_faults = 0;
            self.stop();
            return;
        }

        let next = transition::next_index(
            self.playlist.len(),
            self.index,
            self.shuffle,
            self.repeat,
            &mut self.rng,
        );
        let exhausted = self.consecutive_faults >= self.playlist.len();
        match next {
            Some(i) if fault && (Some(i) == self.index || exhausted) => {
                warn!("giving up after {} failed tracks", self.consecutive_faults);
                self.consecutive_faults = 0;
                self.stop();
            }
            Some(i) => self.jump_to(i),
            None => self.stop(),
        }
    }

    // ---- progress -------------------------------------------------------

    /// When the owner should call `poll_progress` next.
    pub fn progress_deadline(&self) -> Option<Instant> {
        self.sampler.deadline()
    }

    pub fn progress_generation(&self) -> u64 {
        self.sampler.generation()
    }

    pub fn poll_progress(&mut self, now: Instant) {
        let Some(generation) = self.sampler.take_due(now) else {
            return;
        };
        if self.progress_tick(generation) == Tick::Continue {
            self.sampler.reschedule(generation, now);
        }
    }

    /// One sampling step of cycle `generation`.
    pub fn progress_tick(&mut self, generation: u64) -> Tick {
        if !self.sampler.is_current(generation) {
            debug!("progress cycle {generation} superseded");
            return Tick::Stop;
        }
        let Some(p) = self.pipeline.as_ref() else {
            return Tick::Stop;
        };
        if p.state != PipelineState::Playing {
            return Tick::Stop;
        }
        if let Some(fraction) =
            progress::sample(p.handle.query_position(), p.handle.query_duration())
        {
            self.emit(PlayerEvent::Progress(fraction));
        }
        Tick::Continue
    }

    // ---- session --------------------------------------------------------

    /// Write a snapshot to `store`. Returns whether it was written.
    pub fn store_state(&self, store: &mut dyn SessionStore) -> bool {
        let (position_ms, progress) = match self.pipeline.as_ref() {
            Some(p) if p.started => {
                let position = p.handle.query_position();
                let duration = p.handle.query_duration();
                match (position, duration) {
                    (Some(pos), Some(_)) => (
                        Some(pos.as_millis() as u64),
                        progress::sample(position, duration),
                    ),
                    _ => (None, None),
                }
            }
            Some(p) => match p.pending_seek {
                Some(PendingSeek::Position(pos)) => (Some(pos.as_millis() as u64), None),
                _ => (None, None),
            },
            None => (None, None),
        };

        let state = SessionState {
            playlist: self.playlist.clone(),
            index: self.index,
            shuffle: self.shuffle,
            repeat: self.repeat,
            volume: self.volume,
            position_ms,
            progress,
        };
        let result = state
            .encode()
            .and_then(|value| store.set_object(SESSION_KEY, value));
        match result {
            Ok(()) => {
                debug!("session stored ({} tracks)", self.playlist.len());
                true
            }
            Err(e) => {
                warn!("failed to store session: {e}");
                false
            }
        }
    }

    pub fn restore_state(&mut self, store: &dyn SessionStore) {
        let value = match store.get_object(SESSION_KEY) {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("no stored session");
                return;
            }
            Err(e) => {
                warn!("failed to read stored session: {e}");
                return;
            }
        };
        let Some(state) = SessionState::decode(&value) else {
            return;
        };

        self.teardown();
        let len = state.playlist.len();
        self.playlist = state.playlist;
        self.index = match state.index {
            Some(i) if i < len => Some(i),
            Some(i) => {
                warn!("stored index {i} is outside the playlist; starting from the top");
                Some(0)
            }
            None => Some(0),
        };
        self.consecutive_faults = 0;

        self.set_shuffle(state.shuffle);
        self.set_repeat(state.repeat);
        self.set_volume(state.volume);

        if let Some(ms) = state.position_ms {
            self.load_current();
            if let Some(p) = self.pipeline.as_mut() {
                p.pending_seek = Some(PendingSeek::Position(Duration::from_millis(ms)));
            }
        }

        info!(
            "restored session: {} tracks, track {}",
            len,
            self.index.unwrap_or(0)
        );
        self.emit(PlayerEvent::PlaylistChanged);
        self.emit(PlayerEvent::StateChanged);
        if let Some(progress) = state.progress {
            self.emit(PlayerEvent::Progress(progress));
        }
    }

    // ---- queries --------------------------------------------------------

    pub fn state(&self) -> PlayerState {
        match &self.pipeline {
            _ if self.playlist.is_empty() => PlayerState::Idle,
            None => PlayerState::Ready,
            Some(p) if p.state == PipelineState::Playing => PlayerState::Playing,
            Some(_) => PlayerState::Paused,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayerState::Playing
    }

    /// A playlist and a current index exist, so playback is possible.
    pub fn is_active(&self) -> bool {
        !self.playlist.is_empty() && self.index.is_some()
    }

    /// No pipeline exists.
    pub fn has_ended(&self) -> bool {
        self.pipeline.is_none()
    }

    pub fn has_next(&self) -> bool {
        transition::has_next(self.playlist.len(), self.index, self.shuffle, self.repeat)
    }

    pub fn has_previous(&self) -> bool {
        transition::has_previous(self.playlist.len(), self.index, self.shuffle)
    }

    pub fn track_index(&self) -> Option<usize> {
        self.index
    }

    pub fn track_info(&self) -> Option<Track> {
        self.index.and_then(|i| self.playlist.get(i)).cloned()
    }

    pub fn playlist(&self) -> Vec<Track> {
        self.playlist.clone()
    }

    pub fn playlist_len(&self) -> usize {
        self.playlist.len()
    }

    pub fn shuffle(&self) -> ShuffleMode {
        self.shuffle
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Playback position in milliseconds. Before the stream starts this is
    /// the position a deferred seek will jump to, if any.
    pub fn position(&self) -> Option<u64> {
        let p = self.pipeline.as_ref()?;
        if p.started {
            return p.handle.query_position().map(|d| d.as_millis() as u64);
        }
        match p.pending_seek {
            Some(PendingSeek::Position(pos)) => Some(pos.as_millis() as u64),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<f64> {
        let p = self.pipeline.as_ref()?;
        progress::sample(p.handle.query_position(), p.handle.query_duration())
    }

    pub fn duration(&self) -> Option<Duration> {
        self.pipeline.as_ref()?.handle.query_duration()
    }

    pub fn pending_seek(&self) -> Option<PendingSeek> {
        self.pipeline.as_ref()?.pending_seek
    }

    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.outbox)
    }

    // ---- internals ------------------------------------------------------

    fn emit(&mut self, event: PlayerEvent) {
        self.outbox.push(event);
    }

    fn jump_to(&mut self, index: usize) {
        self.index = Some(index);
        self.load_current();
        self.play();
    }

    /// Replace the pipeline with a fresh, paused one for the current track.
    fn load_current(&mut self) {
        if self.playlist.is_empty() {
            return;
        }
        let index = match self.index {
            Some(i) if i < self.playlist.len() => i,
            _ => 0,
        };
        self.index = Some(index);
        self.teardown();

        let id = PipelineId(self.next_pipeline_id);
        self.next_pipeline_id += 1;
        let track = &self.playlist[index];
        info!("loading track {index}: {}", track.display());

        let created = self
            .resolver
            .resolve(&track.id)
            .map_err(|e| e.to_string())
            .and_then(|source| {
                self.factory
                    .create(id, &source, self.events.clone())
                    .map_err(|e| e.to_string())
            });
        let mut handle: Box<dyn PipelineHandle> = match created {
            Ok(handle) => handle,
            Err(reason) => {
                warn!("could not start pipeline {id}: {reason}");
                self.events.emit(id, PipelineEventKind::Error(reason));
                Box::new(FailedPipeline)
            }
        };
        handle.set_volume(self.volume);

        self.pipeline = Some(ActivePipeline {
            id,
            handle,
            state: PipelineState::Paused,
            started: false,
            pending_seek: None,
        });
        self.emit(PlayerEvent::TrackChanged);
    }

    /// Drop the pipeline, if any. Returns whether there was one.
    fn teardown(&mut self) -> bool {
        self.sampler.cancel();
        match self.pipeline.take() {
            Some(mut p) => {
                p.handle.set_state(PipelineState::Null);
                debug!("pipeline {} torn down", p.id);
                true
            }
            None => false,
        }
    }

    fn seek_to(&mut self, target: Duration) {
        let Some(p) = self.pipeline.as_mut() else {
            return;
        };
        if p.handle.seek(target) {
            let position_ms = target.as_millis() as u64;
            debug!("seeked to {position_ms} ms");
            self.emit(PlayerEvent::Seeked { position_ms });
        } else {
            warn!("pipeline {} rejected seek to {target:?}", p.id);
        }
    }
}
