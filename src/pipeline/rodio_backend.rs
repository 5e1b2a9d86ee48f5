//! Production pipeline: fetch the whole stream, decode it with `rodio` and
//! play it on the shared output mixer.
//!
//! Fetching and decoding happen on a loader thread so `create` returns right
//! away. The same thread then polls the sink to detect end of stream, much
//! like the auto-advance check of a classic audio loop.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use rodio::mixer::Mixer;
use rodio::{Decoder, Sink, Source};
use tracing::{debug, warn};

use super::{
    EventSink, PipelineEventKind, PipelineFactory, PipelineHandle, PipelineId, PipelineState,
};
use crate::error::PipelineError;
use crate::resolver::StreamSource;

const EOS_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct RodioFactory {
    mixer: Mixer,
    client: Client,
}

impl RodioFactory {
    pub fn new(mixer: Mixer, user_agent: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Output(format!("http client: {e}")))?;
        Ok(Self { mixer, client })
    }
}

impl PipelineFactory for RodioFactory {
    fn create(
        &mut self,
        id: PipelineId,
        source: &StreamSource,
        events: EventSink,
    ) -> Result<Box<dyn PipelineHandle>, PipelineError> {
        let shared = Arc::new(Shared::default());

        let loader = Loader {
            id,
            source: source.clone(),
            client: self.client.clone(),
            mixer: self.mixer.clone(),
            shared: shared.clone(),
            events,
        };
        thread::Builder::new()
            .name(format!("pipeline-{}", id.0))
            .spawn(move || loader.run())
            .map_err(|e| PipelineError::Output(format!("spawn loader: {e}")))?;

        Ok(Box::new(RodioPipeline { shared }))
    }
}

struct Inner {
    sink: Option<Arc<Sink>>,
    state: PipelineState,
    volume: f32,
    duration: Option<Duration>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            sink: None,
            state: PipelineState::Paused,
            volume: 1.0,
            duration: None,
        }
    }
}

#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
    closed: AtomicBool,
}

impl Shared {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = PipelineState::Null;
            if let Some(sink) = inner.sink.take() {
                sink.stop();
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn sink(&self) -> Option<Arc<Sink>> {
        self.inner.lock().ok().and_then(|inner| inner.sink.clone())
    }
}

struct RodioPipeline {
    shared: Arc<Shared>,
}

impl PipelineHandle for RodioPipeline {
    fn set_state(&mut self, state: PipelineState) {
        if state == PipelineState::Null {
            self.shared.close();
            return;
        }
        let Ok(mut inner) = self.shared.inner.lock() else {
            return;
        };
        inner.state = state;
        // Not loaded yet: the loader applies the requested state once the sink exists.
        if let Some(sink) = inner.sink.as_ref() {
            match state {
                PipelineState::Playing => sink.play(),
                _ => sink.pause(),
            }
        }
    }

    fn query_duration(&self) -> Option<Duration> {
        self.shared.inner.lock().ok().and_then(|inner| inner.duration)
    }

    fn query_position(&self) -> Option<Duration> {
        self.shared.sink().map(|sink| sink.get_pos())
    }

    fn seek(&mut self, position: Duration) -> bool {
        let Some(sink) = self.shared.sink() else {
            return false;
        };
        match sink.try_seek(position) {
            Ok(()) => true,
            Err(e) => {
                warn!("seek to {position:?} rejected: {e}");
                false
            }
        }
    }

    fn set_volume(&mut self, volume: f64) {
        let Ok(mut inner) = self.shared.inner.lock() else {
            return;
        };
        inner.volume = volume as f32;
        if let Some(sink) = inner.sink.as_ref() {
            sink.set_volume(inner.volume);
        }
    }
}

impl Drop for RodioPipeline {
    fn drop(&mut self) {
        self.shared.close();
    }
}

struct Loader {
    id: PipelineId,
    source: StreamSource,
    client: Client,
    mixer: Mixer,
    shared: Arc<Shared>,
    events: EventSink,
}

impl Loader {
    fn run(self) {
        match self.start() {
            Ok(true) => {
                self.events.emit(self.id, PipelineEventKind::StreamStarted);
                self.watch_for_end();
            }
            Ok(false) => debug!("pipeline {} closed while loading", self.id),
            Err(e) => {
                if !self.shared.is_closed() {
                    self.events
                        .emit(self.id, PipelineEventKind::Error(e.to_string()));
                }
            }
        }
    }

    /// Returns `Ok(false)` when the pipeline was torn down before it was ready.
    fn start(&self) -> Result<bool, PipelineError> {
        let bytes = self.fetch()?;
        if self.shared.is_closed() {
            return Ok(false);
        }

        let byte_len = bytes.len() as u64;
        let decoder = Decoder::builder()
            .with_data(Cursor::new(bytes))
            .with_byte_len(byte_len)
            .with_seekable(true)
            .build()
            .map_err(|e| PipelineError::Decode(e.to_string()))?;
        let duration = decoder.total_duration();

        let Ok(mut inner) = self.shared.inner.lock() else {
            return Ok(false);
        };
        if self.shared.is_closed() {
            return Ok(false);
        }

        let sink = Sink::connect_new(&self.mixer);
        sink.set_volume(inner.volume);
        if inner.state != PipelineState::Playing {
            sink.pause();
        }
        sink.append(decoder);

        inner.duration = duration;
        inner.sink = Some(Arc::new(sink));
        debug!(
            "pipeline {} ready ({byte_len} bytes, duration {duration:?})",
            self.id
        );
        Ok(true)
    }

    fn fetch(&self) -> Result<Vec<u8>, PipelineError> {
        let url = self.source.url.as_str();
        let fetch_err = |reason: String| PipelineError::Fetch {
            url: url.to_string(),
            reason,
        };

        if let Some(path) = local_path(url) {
            return std::fs::read(path).map_err(|e| fetch_err(e.to_string()));
        }

        let mut request = self.client.get(url);
        if let Some(token) = self.source.token.as_deref() {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| fetch_err(e.to_string()))?;
        let bytes = response.bytes().map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn watch_for_end(&self) {
        loop {
            thread::sleep(EOS_POLL_INTERVAL);
            if self.shared.is_closed() {
                return;
            }
            let Some(sink) = self.shared.sink() else {
                return;
            };
            if sink.empty() {
                if !self.shared.is_closed() {
                    self.events
                        .emit(self.id, PipelineEventKind::EndOfStream);
                }
                return;
            }
        }
    }
}

/// `file://` URLs and bare paths are read from disk instead of over HTTP.
fn local_path(url: &str) -> Option<&str> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(path);
    }
    if url.contains("://") { None } else { Some(url) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_path_accepts_file_urls_and_bare_paths() {
        assert_eq!(local_path("file:///music/a.flac"), Some("/music/a.flac"));
        assert_eq!(local_path("/music/a.flac"), Some("/music/a.flac"));
        assert_eq!(local_path("https://example.com/v1/file/1"), None);
    }
}
