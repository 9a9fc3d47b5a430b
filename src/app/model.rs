//! Application model: the UI-side view of the engine.
//!
//! `App` holds snapshots of the published track list and transport status,
//! plus purely local state (selection, an in-progress mouse scrub).

use std::path::PathBuf;

use crate::audio::{TrackId, TrackInfo, TransportStatus};

/// The main application model.
pub struct App {
    pub folder: PathBuf,
    pub tracks: Vec<TrackInfo>,
    pub status: TransportStatus,
    pub selected: usize,
    /// A mouse drag on the position gauge is in progress.
    pub scrubbing: bool,
    /// Set when folder scanning failed before anything reached the engine.
    pub load_error: Option<String>,
}

impl App {
    pub fn new(folder: PathBuf) -> Self {
        Self {
            folder,
            tracks: Vec::new(),
            status: TransportStatus::default(),
            selected: 0,
            scrubbing: false,
            load_error: None,
        }
    }

    /// Replace the snapshots and keep the selection in range.
    pub fn sync(&mut self, tracks: Vec<TrackInfo>, status: TransportStatus) {
        self.tracks = tracks;
        self.status = status;
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        if self.tracks.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.tracks.len() {
            self.selected = self.tracks.len() - 1;
        }
    }

    pub fn has_tracks(&self) -> bool {
        !self.tracks.is_empty()
    }

    pub fn next(&mut self) {
        if !self.tracks.is_empty() {
            self.selected = (self.selected + 1).min(self.tracks.len() - 1);
        }
    }

    pub fn prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn selected_track(&self) -> Option<&TrackInfo> {
        self.tracks.get(self.selected)
    }

    pub fn selected_id(&self) -> Option<TrackId> {
        self.selected_track().map(|t| t.id)
    }

    /// The selected track's volume moved by `delta`, clamped to `[0, 1]`.
    pub fn stepped_volume(&self, delta: f32) -> Option<(TrackId, f32)> {
        self.selected_track()
            .map(|t| (t.id, (t.volume + delta).clamp(0.0, 1.0)))
    }

    /// The master gain moved by `delta`, never below 0.
    pub fn stepped_master_gain(&self, delta: f32) -> f32 {
        (self.status.master_gain + delta).max(0.0)
    }
}

/// Map a terminal column inside a gauge spanning `[x, x + width)` to a
/// progress in `[0, 1]`. Columns outside the gauge clamp to its ends.
pub fn progress_at_column(column: u16, x: u16, width: u16) -> f64 {
    if width <= 1 {
        return 0.0;
    }
    let offset = column.saturating_sub(x).min(width - 1);
    offset as f64 / (width - 1) as f64
}

/// Progress for the `0`..`9` jump keys.
pub fn progress_for_digit(digit: char) -> Option<f64> {
    digit.to_digit(10).map(|d| d as f64 / 10.0)
}
