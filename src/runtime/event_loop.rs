use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::{Position, Rect};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::app::{App, progress_at_column, progress_for_digit};
use crate::audio::{ControlCmd, StemPlayer};
use crate::config;
use crate::runtime::request_load;
use crate::ui;

/// Main terminal event loop: pulls the engine's published state, draws,
/// and turns input into engine commands. Returns `Ok(())` on quit.
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    player: &StemPlayer,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = player.status_handle();
    let tracks = player.tracks_handle();

    loop {
        let status_snapshot = status.lock().ok().map(|s| s.clone());
        let tracks_snapshot = tracks.lock().ok().map(|t| t.clone());
        if let (Some(s), Some(t)) = (status_snapshot, tracks_snapshot) {
            app.sync(t, s);
        }

        terminal.draw(|f| ui::draw(f, app, &settings.ui, &settings.controls))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key_event(key, settings, app, player) {
                    break;
                }
            }
            Event::Mouse(mouse) => {
                let size = terminal.size()?;
                let area = Rect::new(0, 0, size.width, size.height);
                let gauge = ui::gauge_inner(ui::layout(area).gauge);
                handle_mouse_event(mouse, gauge, app, player);
            }
            _ => {}
        }
    }

    Ok(())
}

/// Returns `true` when the user asked to quit.
fn handle_key_event(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    player: &StemPlayer,
) -> bool {
    let controls = &settings.controls;
    let cmd = match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('j') | KeyCode::Down => {
            app.next();
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.prev();
            None
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => Some(ControlCmd::TogglePlay),
        KeyCode::Char('m') => app.selected_id().map(ControlCmd::ToggleMute),
        KeyCode::Char('s') => app.selected_id().map(ControlCmd::ToggleSolo),
        KeyCode::Char('+') | KeyCode::Char('=') => app
            .stepped_volume(controls.volume_step)
            .map(|(id, v)| ControlCmd::SetVolume(id, v)),
        KeyCode::Char('-') => app
            .stepped_volume(-controls.volume_step)
            .map(|(id, v)| ControlCmd::SetVolume(id, v)),
        KeyCode::Char(']') => Some(ControlCmd::SetMasterGain(
            app.stepped_master_gain(controls.master_step),
        )),
        KeyCode::Char('[') => Some(ControlCmd::SetMasterGain(
            app.stepped_master_gain(-controls.master_step),
        )),
        KeyCode::Char('l') | KeyCode::Right => {
            Some(ControlCmd::SeekBy(controls.scrub_seconds as f64))
        }
        KeyCode::Char('h') | KeyCode::Left => {
            Some(ControlCmd::SeekBy(-(controls.scrub_seconds as f64)))
        }
        KeyCode::Char('r') => {
            request_load(app, player, settings);
            None
        }
        KeyCode::Char(c) => progress_for_digit(c).map(ControlCmd::Seek),
        _ => None,
    };
    if let Some(cmd) = cmd {
        let _ = player.send(cmd);
    }
    false
}

fn handle_mouse_event(mouse: MouseEvent, gauge: Rect, app: &mut App, player: &StemPlayer) {
    let progress = progress_at_column(mouse.column, gauge.x, gauge.width);
    let on_gauge = gauge.contains(Position::new(mouse.column, mouse.row));
    let cmd = match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if on_gauge => {
            app.scrubbing = true;
            ControlCmd::BeginScrub(progress)
        }
        // A drag keeps scrubbing even when the pointer leaves the gauge.
        MouseEventKind::Drag(MouseButton::Left) if app.scrubbing => ControlCmd::Scrub(progress),
        MouseEventKind::Up(MouseButton::Left) if app.scrubbing => {
            app.scrubbing = false;
            ControlCmd::EndScrub(progress)
        }
        _ => return,
    };
    let _ = player.send(cmd);
}
