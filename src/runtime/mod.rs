use std::env;
use std::path::Path;
use std::sync::mpsc;

use tracing::{error, info, warn};

use crate::mpris;
use crate::store::{JsonFileStore, MemoryStore, SessionStore};

mod commands;
mod console;
mod logging;
mod service;
mod settings;

pub use commands::ConsoleCommand;
pub(crate) use service::PlayerMsg;
pub use service::{PlayerCommand, PlayerHandle, PlayerService, PlayerSnapshot};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let (settings, warnings) = settings::load_settings();

    if args.iter().any(|a| a == "--print-config") {
        print!("{}", toml::to_string_pretty(&settings)?);
        return Ok(());
    }

    logging::init(&settings.log.filter);
    for w in warnings {
        warn!("{w}");
    }

    let store: Box<dyn SessionStore + Send> = match settings.state_path() {
        Some(path) => {
            info!("session file: {}", path.display());
            Box::new(JsonFileStore::open(path))
        }
        None => {
            warn!("no state directory found; the session will not be kept");
            Box::new(MemoryStore::default())
        }
    };

    let service = PlayerService::spawn(&settings, store)?;
    let player = service.handle();
    console::spawn_event_log(&player);

    // A playlist file on the command line replaces whatever was restored.
    if let Some(path) = args.iter().find(|a| !a.starts_with("--")) {
        match commands::read_playlist(Path::new(path)) {
            Ok(tracks) => {
                player.send(PlayerCommand::SetPlaylist(tracks));
                player.send(PlayerCommand::Play);
            }
            Err(e) => error!("{e}"),
        }
    }

    let (console_tx, console_rx) = mpsc::channel::<ConsoleCommand>();
    if settings.mpris.enabled {
        mpris::spawn_mpris(player.clone(), console_tx.clone());
    }
    console::spawn_stdin_reader(console_tx);

    for cmd in console_rx {
        if !console::dispatch(cmd, &player) {
            break;
        }
    }

    service.shutdown();
    Ok(())
}
