use super::*;
use std::sync::mpsc;

#[test]
fn event_sink_tags_events_with_the_pipeline_id() {
    let (tx, rx) = mpsc::channel();
    let sink = EventSink::from_sender(tx);

    sink.emit(PipelineId(3), PipelineEventKind::StreamStarted);
    sink.clone()
        .emit(PipelineId(4), PipelineEventKind::Error("boom".into()));

    assert_eq!(
        rx.try_recv().unwrap(),
        PipelineEvent {
            id: PipelineId(3),
            kind: PipelineEventKind::StreamStarted
        }
    );
    let second = rx.try_recv().unwrap();
    assert_eq!(second.id, PipelineId(4));
    assert_eq!(second.kind, PipelineEventKind::Error("boom".into()));
}

#[test]
fn event_sink_survives_a_dropped_receiver() {
    let (tx, rx) = mpsc::channel();
    let sink = EventSink::from_sender(tx);
    drop(rx);
    sink.emit(PipelineId(1), PipelineEventKind::EndOfStream);
}

#[test]
fn failed_pipeline_is_inert() {
    let mut p = FailedPipeline;
    p.set_state(PipelineState::Playing);
    p.set_volume(0.5);
    assert!(!p.seek(Duration::from_secs(1)));
    assert_eq!(p.query_duration(), None);
    assert_eq!(p.query_position(), None);
}

#[test]
fn pipeline_id_displays_with_a_hash() {
    assert_eq!(PipelineId(12).to_string(), "#12");
}
