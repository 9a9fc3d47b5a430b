//! Messages and shared handles of the audio subsystem.
//!
//! `ControlCmd` is what the UI (and the waveform jobs) send to the control
//! thread; the handles are the read-only projections it publishes back.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::ExtractError;
use crate::waveform::WaveformData;

use super::track::{TrackId, TrackInfo};
use super::transport::TransportState;

#[derive(Debug)]
pub enum ControlCmd {
    /// Replace the session with the stems at `paths` (already scanned from `folder`).
    LoadFolder { folder: PathBuf, paths: Vec<PathBuf> },
    /// Play when stopped, stop (and rewind) when playing.
    TogglePlay,
    /// Scrub gestures carry a progress in `[0, 1]`.
    BeginScrub(f64),
    Scrub(f64),
    EndScrub(f64),
    /// Immediate reposition to a progress in `[0, 1]`.
    Seek(f64),
    /// Relative reposition in seconds.
    SeekBy(f64),
    ToggleMute(TrackId),
    ToggleSolo(TrackId),
    SetVolume(TrackId, f32),
    SetMasterGain(f32),
    /// A background extraction finished.
    WaveformReady {
        session: u64,
        track: TrackId,
        result: Result<WaveformData, ExtractError>,
    },
    Quit,
}

/// Transport snapshot shared with the UI.
#[derive(Debug, Clone, Default)]
pub struct TransportStatus {
    pub state: TransportState,
    /// Tick-driven position in seconds.
    pub position: f64,
    pub duration: f64,
    /// Position read back from the audio clock.
    pub audio_time: f64,
    pub master_gain: f32,
    pub folder: Option<PathBuf>,
    /// Last load summary or device problem.
    pub message: Option<String>,
    pub stalled: bool,
}

impl TransportStatus {
    /// Position as a fraction of the duration.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

pub type StatusHandle = Arc<Mutex<TransportStatus>>;
pub type TrackListHandle = Arc<Mutex<Vec<TrackInfo>>>;
