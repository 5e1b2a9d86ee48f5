//! In-memory pipeline backend for exercising the player without a decoder.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::{EventSink, PipelineFactory, PipelineHandle, PipelineId, PipelineState};
use crate::error::PipelineError;
use crate::resolver::StreamSource;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { id: PipelineId, url: String, token: Option<String> },
    SetState(PipelineId, PipelineState),
    Seek(PipelineId, Duration),
    Volume(PipelineId, f64),
}

#[derive(Debug)]
pub struct FakeBackend {
    pub calls: Vec<Call>,
    pub position: Option<Duration>,
    pub duration: Option<Duration>,
    pub accept_seeks: bool,
    pub fail_create: bool,
    pub live: usize,
    pub max_live: usize,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            position: None,
            duration: None,
            accept_seeks: true,
            fail_create: false,
            live: 0,
            max_live: 0,
        }
    }
}

impl FakeBackend {
    pub fn seeks(&self) -> Vec<Duration> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Seek(_, pos) => Some(*pos),
                _ => None,
            })
            .collect()
    }

    pub fn created(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Create { url, .. } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }
}

pub type SharedBackend = Rc<RefCell<FakeBackend>>;

pub struct FakeFactory {
    backend: SharedBackend,
}

impl FakeFactory {
    pub fn new() -> (Self, SharedBackend) {
        let backend = SharedBackend::default();
        (
            Self {
                backend: backend.clone(),
            },
            backend,
        )
    }
}

impl PipelineFactory for FakeFactory {
    fn create(
        &mut self,
        id: PipelineId,
        source: &StreamSource,
        _events: EventSink,
    ) -> Result<Box<dyn PipelineHandle>, PipelineError> {
        let mut b = self.backend.borrow_mut();
        if b.fail_create {
            return Err(PipelineError::Output("fake output refused".into()));
        }
        b.calls.push(Call::Create {
            id,
            url: source.url.clone(),
            token: source.token.clone(),
        });
        b.live += 1;
        b.max_live = b.max_live.max(b.live);
        Ok(Box::new(FakePipeline {
            id,
            backend: self.backend.clone(),
        }))
    }
}

pub struct FakePipeline {
    id: PipelineId,
    backend: SharedBackend,
}

impl PipelineHandle for FakePipeline {
    fn set_state(&mut self, state: PipelineState) {
        self.backend
            .borrow_mut()
            .calls
            .push(Call::SetState(self.id, state));
    }

    fn query_duration(&self) -> Option<Duration> {
        self.backend.borrow().duration
    }

    fn query_position(&self) -> Option<Duration> {
        self.backend.borrow().position
    }

    fn seek(&mut self, position: Duration) -> bool {
        let mut b = self.backend.borrow_mut();
        b.calls.push(Call::Seek(self.id, position));
        if b.accept_seeks {
            b.position = Some(position);
        }
        b.accept_seeks
    }

    fn set_volume(&mut self, volume: f64) {
        self.backend
            .borrow_mut()
            .calls
            .push(Call::Volume(self.id, volume));
    }
}

impl Drop for FakePipeline {
    fn drop(&mut self) {
        self.backend.borrow_mut().live -= 1;
    }
}
