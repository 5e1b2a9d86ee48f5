//! Playback session management: playlist, transport, settings and the
//! persisted session snapshot.

mod machine;
mod progress;
mod session;
mod transition;
mod types;

pub use machine::Player;
pub use progress::Tick;
pub use session::{SESSION_KEY, SessionState};
pub use types::{PendingSeek, PlayerEvent, PlayerState, RepeatMode, ShuffleMode, UnknownMode};
