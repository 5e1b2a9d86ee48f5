//! Playback pipeline abstraction.
//!
//! A pipeline is a one-shot decode/render graph for a single track. The
//! player drives it through a narrow control surface and learns about its
//! progress through asynchronous `PipelineEvent`s delivered to an `EventSink`.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::error::PipelineError;
use crate::resolver::StreamSource;

mod rodio_backend;

#[cfg(test)]
pub mod fake;

pub use rodio_backend::RodioFactory;

/// Identifies one pipeline instance. Every load gets a fresh id so events
/// from a torn-down pipeline can be told apart from the live one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PipelineId(pub u64);

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Torn down; the handle must not be used afterwards.
    Null,
    Paused,
    Playing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEventKind {
    /// The stream is decodable and positioned at its start; seeks are honored from now on.
    StreamStarted,
    EndOfStream,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineEvent {
    pub id: PipelineId,
    pub kind: PipelineEventKind,
}

/// Where pipelines post their events. Cheap to clone; safe to use from
/// loader threads.
#[derive(Clone)]
pub struct EventSink {
    emit: Arc<dyn Fn(PipelineEvent) + Send + Sync>,
}

impl EventSink {
    pub fn new(emit: impl Fn(PipelineEvent) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    pub fn from_sender(tx: Sender<PipelineEvent>) -> Self {
        Self::new(move |event| {
            let _ = tx.send(event);
        })
    }

    pub fn emit(&self, id: PipelineId, kind: PipelineEventKind) {
        (self.emit)(PipelineEvent { id, kind });
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// Control surface of a live pipeline.
pub trait PipelineHandle {
    fn set_state(&mut self, state: PipelineState);
    fn query_duration(&self) -> Option<Duration>;
    fn query_position(&self) -> Option<Duration>;
    /// Returns whether the pipeline accepted the seek.
    fn seek(&mut self, position: Duration) -> bool;
    fn set_volume(&mut self, volume: f64);
}

pub trait PipelineFactory {
    /// Start building a pipeline for `source`. Construction may finish
    /// asynchronously; completion and failures are reported through `events`.
    fn create(
        &mut self,
        id: PipelineId,
        source: &StreamSource,
        events: EventSink,
    ) -> Result<Box<dyn PipelineHandle>, PipelineError>;
}

/// Placeholder kept as the active pipeline when a track could not even be
/// handed to the backend. Its error event is already on the way.
#[derive(Debug, Default)]
pub struct FailedPipeline;

impl PipelineHandle for FailedPipeline {
    fn set_state(&mut self, _state: PipelineState) {}

    fn query_duration(&self) -> Option<Duration> {
        None
    }

    fn query_position(&self) -> Option<Duration> {
        None
    }

    fn seek(&mut self, _position: Duration) -> bool {
        false
    }

    fn set_volume(&mut self, _volume: f64) {}
}

#[cfg(test)]
mod tests;
