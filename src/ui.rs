//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, Padding, Paragraph, Sparkline, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock};

use crate::app::App;
use crate::audio::{TrackInfo, TransportState, WaveformSlot};
use crate::config::{ControlsSettings, UiSettings};

static CONTROLS_MAP: LazyLock<BTreeMap<String, String>> = LazyLock::new(|| {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    map.insert("j/k".to_string(), "select stem".to_string());
    map.insert("space/p".to_string(), "play/stop".to_string());
    map.insert("m".to_string(), "mute".to_string());
    map.insert("s".to_string(), "solo".to_string());
    map.insert("+/-".to_string(), "stem volume".to_string());
    map.insert("[/]".to_string(), "master".to_string());
    // h/l is filled dynamically from config.
    map.insert("0-9".to_string(), "jump".to_string());
    map.insert("r".to_string(), "reload".to_string());
    map.insert("q".to_string(), "quit".to_string());
    map
});

/// Height of one stem row (border + waveform + border).
const TRACK_ROW_HEIGHT: u16 = 3;

/// Render the controls help text, incorporating scrub seconds.
fn controls_text(scrub_seconds: u64) -> String {
    let order = [
        "j/k", "space/p", "h/l", "0-9", "m", "s", "+/-", "[/]", "r", "q",
    ];
    order
        .iter()
        .filter_map(|k| {
            if *k == "h/l" {
                Some(format!("[h/l] scrub -/+{}s", scrub_seconds))
            } else {
                CONTROLS_MAP.get(*k).map(|v| format!("[{}] {}", k, v))
            }
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

/// Format seconds as `MM:SS.ss`.
pub fn format_clock(secs: f64) -> String {
    let hundredths = if secs.is_finite() && secs > 0.0 {
        (secs * 100.0).round() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}.{:02}",
        hundredths / 6000,
        (hundredths % 6000) / 100,
        hundredths % 100
    )
}

/// Squeeze `peaks` into `width` columns (loudest peak per column), scaled to 0..=100.
pub fn fit_peaks(peaks: &[f32], width: usize) -> Vec<u64> {
    if peaks.is_empty() || width == 0 {
        return Vec::new();
    }
    let per_column = peaks.len().div_ceil(width);
    peaks
        .chunks(per_column)
        .map(|chunk| {
            let max = chunk.iter().copied().fold(0.0f32, f32::max);
            (max.clamp(0.0, 1.0) * 100.0).round() as u64
        })
        .collect()
}

/// Screen regions of the main view.
pub struct Areas {
    pub header: Rect,
    pub status: Rect,
    pub gauge: Rect,
    pub tracks: Rect,
    pub footer: Rect,
}

pub fn layout(area: Rect) -> Areas {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(TRACK_ROW_HEIGHT),
            Constraint::Length(4),
        ])
        .split(area);
    Areas {
        header: chunks[0],
        status: chunks[1],
        gauge: chunks[2],
        tracks: chunks[3],
        footer: chunks[4],
    }
}

/// The clickable part of the gauge (inside its border).
pub fn gauge_inner(gauge: Rect) -> Rect {
    Block::default().borders(Borders::ALL).inner(gauge)
}

fn state_label(app: &App) -> &'static str {
    if app.scrubbing {
        return "SCRUBBING";
    }
    match app.status.state {
        TransportState::Stopped => "STOPPED",
        TransportState::Playing => "PLAYING",
        TransportState::Scrubbing => "SCRUBBING",
    }
}

fn status_text(app: &App) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.push(state_label(app).to_string());
    parts.push(format!(
        "{} / {}",
        format_clock(app.status.position),
        format_clock(app.status.duration)
    ));
    if app.status.state == TransportState::Playing {
        parts.push(format!("audio {}", format_clock(app.status.audio_time)));
    }
    parts.push(format!("Master: {:.0}%", app.status.master_gain * 100.0));
    if let Some(msg) = app.load_error.as_ref().or(app.status.message.as_ref()) {
        parts.push(msg.clone());
    }
    let folder = app
        .status
        .folder
        .as_ref()
        .unwrap_or(&app.folder)
        .display()
        .to_string();
    parts.push(format!("Dir: {}", folder));
    if let Some(track) = app.selected_track() {
        parts.push(format!("Stem: {}", track.path.display()));
    }
    parts.join(" • ")
}

fn track_title(track: &TrackInfo) -> String {
    let mut flags = String::new();
    if track.muted {
        flags.push('M');
    }
    if track.solo {
        flags.push('S');
    }
    let length = format_clock(track.duration);
    if flags.is_empty() {
        format!(
            " {} • {} • vol {:.0}% ",
            track.name,
            length,
            track.volume * 100.0
        )
    } else {
        format!(
            " {} [{}] • {} • vol {:.0}% ",
            track.name,
            flags,
            length,
            track.volume * 100.0
        )
    }
}

/// First visible row so `selected` stays roughly centered.
fn window_start(selected: usize, total: usize, rows: usize) -> usize {
    if total <= rows || rows == 0 {
        return 0;
    }
    let half = rows / 2;
    let start = selected.saturating_sub(half);
    start.min(total - rows)
}

fn draw_tracks(frame: &mut Frame, app: &App, area: Rect) {
    if !app.has_tracks() {
        let empty = Paragraph::new("No playable stems in this folder.")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" stems "));
        frame.render_widget(empty, area);
        return;
    }

    let rows = (area.height / TRACK_ROW_HEIGHT) as usize;
    let start = window_start(app.selected, app.tracks.len(), rows);
    let visible = app.tracks.iter().enumerate().skip(start).take(rows.max(1));

    for (row, (i, track)) in visible.enumerate() {
        let rect = Rect {
            x: area.x,
            y: area.y + row as u16 * TRACK_ROW_HEIGHT,
            width: area.width,
            height: TRACK_ROW_HEIGHT.min(area.height),
        };
        let mut block = Block::default()
            .borders(Borders::ALL)
            .title(track_title(track));
        if i == app.selected {
            block = block.border_style(Style::default().add_modifier(Modifier::BOLD));
        }
        let inner = block.inner(rect);
        frame.render_widget(block, rect);

        let dim = track.gain == 0.0;
        let color = if dim { Color::DarkGray } else { Color::Cyan };
        match &track.waveform {
            WaveformSlot::Ready(w) => {
                let data = fit_peaks(&w.peaks, inner.width as usize);
                let spark = Sparkline::default()
                    .data(data)
                    .max(100)
                    .style(Style::default().fg(color));
                frame.render_widget(spark, inner);
            }
            WaveformSlot::Pending => {
                frame.render_widget(Paragraph::new("reading waveform…"), inner);
            }
            WaveformSlot::Unavailable => {
                frame.render_widget(Paragraph::new("waveform unavailable"), inner);
            }
        }
    }
}

/// Render the entire UI into the provided `frame`.
pub fn draw(
    frame: &mut Frame,
    app: &App,
    ui_settings: &UiSettings,
    controls_settings: &ControlsSettings,
) {
    let areas = layout(frame.area());

    // Header
    let header = Paragraph::new(ui_settings.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" stemplay ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, areas.header);

    // Status box; red while the device is stalled.
    let status_style = if app.status.stalled {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    let status_par = Paragraph::new(status_text(app))
        .block(
            Block::bordered()
                .border_style(status_style)
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                })
                .title(" status "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(status_par, areas.status);

    // Position gauge; mouse drags on it scrub.
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" position "))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(app.status.progress())
        .label(format_clock(app.status.position));
    frame.render_widget(gauge, areas.gauge);

    draw_tracks(frame, app, areas.tracks);

    let footer = Paragraph::new(controls_text(controls_settings.scrub_seconds))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                }),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, areas.footer);
}
