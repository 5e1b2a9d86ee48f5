use super::*;
use crate::pipeline::fake::{FakeFactory, SharedBackend};
use crate::pipeline::{PipelineEventKind, PipelineId};
use crate::player::SESSION_KEY;
use crate::resolver::StreamSource;
use crate::store::MemoryStore;

struct EchoResolver;

impl crate::resolver::StreamResolver for EchoResolver {
    fn resolve(&self, track_id: &str) -> Result<StreamSource, crate::error::ResolveError> {
        Ok(StreamSource {
            url: format!("mem://{track_id}"),
            token: None,
        })
    }
}

fn fake_player(handle: &PlayerHandle) -> (Player, SharedBackend) {
    let (factory, backend) = FakeFactory::new();
    let tx = handle.tx.clone();
    let sink = EventSink::new(move |event| {
        let _ = tx.send(PlayerMsg::Pipeline(event));
    });
    let player = Player::new(Box::new(factory), Box::new(EchoResolver), sink);
    (player, backend)
}

fn tracks(n: usize) -> Vec<Track> {
    (0..n).map(|i| Track::new(i.to_string())).collect()
}

#[test]
fn commands_run_in_order_and_shutdown_saves_the_session() {
    let (handle, rx, snapshot) = PlayerHandle::detached();
    let (player, backend) = fake_player(&handle);
    let events = handle.subscribe();

    assert!(handle.send(PlayerCommand::SetPlaylist(tracks(3))));
    handle.send(PlayerCommand::Play);
    handle.send(PlayerCommand::Next);
    handle.tx.send(PlayerMsg::Shutdown).unwrap();

    let mut store = MemoryStore::default();
    run_loop(player, rx, &mut store, &snapshot);

    let received: Vec<_> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            PlayerEvent::PlaylistChanged,
            PlayerEvent::StateChanged,
            PlayerEvent::TrackChanged,
            PlayerEvent::StateChanged,
            PlayerEvent::TrackChanged,
            PlayerEvent::StateChanged,
            PlayerEvent::StateChanged,
        ]
    );

    let snap = handle.snapshot();
    assert_eq!(snap.state, PlayerState::Ready);
    assert_eq!(snap.track_index, Some(1));
    assert_eq!(snap.playlist_len, 3);
    assert!(snap.has_next);
    assert_eq!(backend.borrow().live, 0);

    let saved = store.get_object(SESSION_KEY).unwrap().unwrap();
    assert_eq!(saved["index"], 1);
}

#[test]
fn pipeline_events_reach_the_player_through_the_queue() {
    let (handle, rx, snapshot) = PlayerHandle::detached();
    let (player, _backend) = fake_player(&handle);

    handle.send(PlayerCommand::SetPlaylist(tracks(2)));
    handle.send(PlayerCommand::Play);
    handle
        .tx
        .send(PlayerMsg::Pipeline(PipelineEvent {
            id: PipelineId(1),
            kind: PipelineEventKind::EndOfStream,
        }))
        .unwrap();
    handle.send(PlayerCommand::StoreState);
    handle.tx.send(PlayerMsg::Shutdown).unwrap();

    let mut store = MemoryStore::default();
    run_loop(player, rx, &mut store, &snapshot);

    assert_eq!(handle.snapshot().track_index, Some(1));
}

#[test]
fn dropped_subscribers_are_forgotten() {
    let (handle, rx, snapshot) = PlayerHandle::detached();
    let (player, _backend) = fake_player(&handle);

    drop(handle.subscribe());
    let kept = handle.subscribe();
    handle.send(PlayerCommand::SetVolume(0.5));
    handle.tx.send(PlayerMsg::Shutdown).unwrap();

    run_loop(player, rx, &mut MemoryStore::default(), &snapshot);

    assert_eq!(
        kept.try_iter().collect::<Vec<_>>(),
        vec![PlayerEvent::VolumeChanged(0.5)]
    );
    assert_eq!(handle.snapshot().volume, 0.5);
}

#[test]
fn fresh_snapshot_matches_an_idle_player() {
    let (handle, _rx, _snapshot) = PlayerHandle::detached();
    let (player, _backend) = fake_player(&handle);
    assert_eq!(PlayerSnapshot::capture(&player), PlayerSnapshot::default());
}

#[test]
fn send_fails_once_the_player_is_gone() {
    let (handle, rx, _snapshot) = PlayerHandle::detached();
    drop(rx);
    assert!(!handle.send(PlayerCommand::Play));
}

#[test]
fn losing_every_sender_saves_and_stops() {
    let (handle, rx, snapshot) = PlayerHandle::detached();
    let (factory, backend) = FakeFactory::new();
    let (pipeline_tx, _pipeline_rx) = std::sync::mpsc::channel();
    let player = Player::new(
        Box::new(factory),
        Box::new(EchoResolver),
        EventSink::from_sender(pipeline_tx),
    );

    handle.send(PlayerCommand::SetPlaylist(tracks(2)));
    handle.send(PlayerCommand::PlayIndex(1));
    drop(handle);

    let mut store = MemoryStore::default();
    run_loop(player, rx, &mut store, &snapshot);

    let saved = store.get_object(SESSION_KEY).unwrap().unwrap();
    assert_eq!(saved["index"], 1);
    assert_eq!(backend.borrow().live, 0);
    assert_eq!(snapshot.lock().unwrap().state, PlayerState::Ready);
}
