use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::waveform::WaveformData;

use super::bus::NodeId;
use super::resolve::MixFlags;
use super::stem::StemAudio;

/// Stable per-session track identity, unrelated to the file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub(crate) u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Display data for a track; filled in once by the background extractor.
#[derive(Debug, Clone, Default)]
pub enum WaveformSlot {
    #[default]
    Pending,
    Ready(Arc<WaveformData>),
    Unavailable,
}

/// One loaded stem and its mixer state.
///
/// The decoded audio never changes after load; only the flags, volume and
/// the resulting node gain do.
pub struct Track {
    pub(crate) id: TrackId,
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) audio: Arc<StemAudio>,
    pub(crate) node: NodeId,
    pub(crate) flags: MixFlags,
    pub(crate) volume: f32,
    /// Gain last written to the node (`volume × effective gain`).
    pub(crate) gain: f32,
    pub(crate) waveform: WaveformSlot,
}

impl Track {
    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn flags(&self) -> MixFlags {
        self.flags
    }

    pub fn duration_secs(&self) -> f64 {
        self.audio.duration_secs()
    }

    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            id: self.id,
            name: self.name.clone(),
            path: self.path.clone(),
            muted: self.flags.muted,
            solo: self.flags.solo,
            volume: self.volume,
            gain: self.gain,
            duration: self.duration_secs(),
            waveform: self.waveform.clone(),
        }
    }
}

/// Read-only projection published to the UI.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub id: TrackId,
    pub name: String,
    pub path: PathBuf,
    pub muted: bool,
    pub solo: bool,
    pub volume: f32,
    pub gain: f32,
    pub duration: f64,
    pub waveform: WaveformSlot,
}
