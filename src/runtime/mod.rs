use std::env;
use std::path::{Path, PathBuf};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use log::{info, warn};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::app::App;
use crate::audio::StemPlayer;
use crate::config::Settings;
use crate::library::scan_folder;

mod event_loop;
mod logging;
mod settings;

/// Scan `folder` and hand the result to the engine. Scan failures are kept
/// on the app for display; the engine keeps its current session.
pub(crate) fn request_load(app: &mut App, player: &StemPlayer, settings: &Settings) {
    match scan_folder(&app.folder, &settings.library) {
        Ok(paths) => {
            app.load_error = None;
            if player.load_folder(app.folder.clone(), paths).is_err() {
                app.load_error = Some("audio engine is not running".to_string());
            }
        }
        Err(e) => {
            warn!("{e}");
            app.load_error = Some(e.to_string());
        }
    }
}

fn folder_arg() -> PathBuf {
    env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| Path::new(".").to_path_buf())
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = settings::load_settings();
    match logging::init_logging(&settings.log) {
        Ok(path) => info!("stemplay starting, logging to {}", path.display()),
        Err(e) => eprintln!("stemplay: logging disabled: {e}"),
    }

    let player = StemPlayer::new(&settings)?;
    let mut app = App::new(folder_arg());
    request_load(&mut app, &player, &settings);

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = event_loop::run(&mut terminal, &settings, &mut app, &player);

    player.shutdown();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    info!("stemplay exiting");
    run_result
}
