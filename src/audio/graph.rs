//! The playback graph: stems → gain nodes → mix bus → output.
//!
//! All tracks of a session share one bus, so starting, stopping and seeking
//! always act on the whole set at once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{DecodeError, DeviceError};

use super::bus::{MixHandle, mix_bus};
use super::output::AudioOutput;
use super::resolve::{MixFlags, any_solo, resolve_all};
use super::stem::StemAudio;
use super::track::{Track, TrackId, TrackInfo, WaveformSlot};

/// Why a candidate file did not become a track.
#[derive(Debug)]
pub enum SkipReason {
    Decode(DecodeError),
    Routing(DeviceError),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Decode(e) => write!(f, "{e}"),
            SkipReason::Routing(e) => write!(f, "{e}"),
        }
    }
}

/// Outcome of `PlaybackGraph::load_folder`.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<TrackId>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

const RECLAIM_TIMEOUT: Duration = Duration::from_millis(50);

pub struct PlaybackGraph {
    output: Box<dyn AudioOutput>,
    bus: Option<MixHandle>,
    tracks: Vec<Track>,
    master_gain: f32,
    start_lead: Duration,
    next_track: u64,
    /// Buffers of a previous session the device had not handed back in time.
    /// Released here once nothing else holds them.
    parked: Vec<Arc<StemAudio>>,
}

fn frame_at(seconds: f64, sample_rate: u32) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64).floor() as u64
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl PlaybackGraph {
    pub fn new(mut output: Box<dyn AudioOutput>, master_gain: f32, start_lead: Duration) -> Self {
        output.set_master_gain(master_gain);
        Self {
            output,
            bus: None,
            tracks: Vec::new(),
            master_gain,
            start_lead,
            next_track: 0,
            parked: Vec::new(),
        }
    }

    /// Replace the whole track set with the stems decoded from `paths`.
    ///
    /// Files that fail to decode, or whose sample rate differs from the first
    /// stem's, are skipped and listed in the report.
    pub fn load_folder(&mut self, paths: &[PathBuf]) -> LoadReport {
        self.unload();

        let mut report = LoadReport::default();
        let mut decoded: Vec<(PathBuf, Arc<StemAudio>)> = Vec::new();
        let mut session_rate: Option<u32> = None;

        for path in paths {
            let stem = match StemAudio::decode(path) {
                Ok(stem) => stem,
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    report.skipped.push((path.clone(), SkipReason::Decode(e)));
                    continue;
                }
            };
            let rate = *session_rate.get_or_insert(stem.sample_rate());
            if stem.sample_rate() != rate {
                let e = DecodeError::FormatMismatch {
                    path: path.clone(),
                    expected: rate,
                    found: stem.sample_rate(),
                };
                warn!("skipping {}: {e}", path.display());
                report.skipped.push((path.clone(), SkipReason::Decode(e)));
                continue;
            }
            debug!(
                "decoded {}: {} frames, {} ch @ {} Hz",
                path.display(),
                stem.frames(),
                stem.channels(),
                stem.sample_rate()
            );
            decoded.push((path.clone(), Arc::new(stem)));
        }

        let Some(rate) = session_rate.filter(|_| !decoded.is_empty()) else {
            info!("no playable stems in {} candidates", paths.len());
            return report;
        };

        let (mut bus, source) = mix_bus(rate);
        match self.output.connect(source) {
            Ok(()) => bus.set_live(true),
            Err(e) => warn!("playing silently: {e}"),
        }

        for (path, audio) in decoded {
            let node = match bus.attach(audio.clone(), 0.0) {
                Ok(node) => node,
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    report.skipped.push((path, SkipReason::Routing(e)));
                    continue;
                }
            };
            let id = TrackId(self.next_track);
            self.next_track += 1;
            report.loaded.push(id);
            self.tracks.push(Track {
                id,
                name: display_name(&path),
                path,
                audio,
                node,
                flags: MixFlags::default(),
                volume: 1.0,
                gain: 0.0,
                waveform: WaveformSlot::Pending,
            });
        }

        self.bus = Some(bus);
        self.apply_gains();
        if let Err(e) = self.reposition(0.0, false) {
            warn!("failed to prime stems: {e}");
        }
        info!(
            "loaded {} stems at {rate} Hz ({} skipped)",
            report.loaded.len(),
            report.skipped.len()
        );
        report
    }

    /// Stop and detach every node, then drop the session.
    fn unload(&mut self) {
        self.parked.retain(|audio| Arc::strong_count(audio) > 1);
        if let Some(mut bus) = self.bus.take() {
            let _ = bus.stop();
            let mut detached = 0;
            for track in &self.tracks {
                match bus.detach(track.node) {
                    Ok(()) => detached += 1,
                    Err(e) => {
                        debug!("detach {}: {e}", track.id);
                        break;
                    }
                }
            }
            if bus.is_live() {
                let returned = bus.reclaim_within(detached, RECLAIM_TIMEOUT);
                if returned < self.tracks.len() {
                    debug!(
                        "{} voices still held by the device",
                        self.tracks.len() - returned
                    );
                    self.parked
                        .extend(self.tracks.iter().map(|t| t.audio.clone()));
                }
            }
            self.output.disconnect();
        }
        self.tracks.clear();
    }

    /// Start every track from the current position on one shared frame.
    pub fn play(&mut self) -> Result<(), DeviceError> {
        let Some(bus) = self.bus.as_mut() else {
            return Ok(());
        };
        let frame = bus.elapsed();
        bus.seek(frame)?;
        bus.start(self.start_lead)
    }

    /// Stop all, move every track to `seconds`, and optionally restart together.
    ///
    /// A track shorter than `seconds` stays silent.
    pub fn reposition(&mut self, seconds: f64, play_now: bool) -> Result<(), DeviceError> {
        let Some(bus) = self.bus.as_mut() else {
            return Ok(());
        };
        let frame = frame_at(seconds, bus.sample_rate());
        bus.seek(frame)?;
        if play_now {
            bus.start(self.start_lead)?;
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), DeviceError> {
        match self.bus.as_mut() {
            Some(bus) => bus.stop(),
            None => Ok(()),
        }
    }

    /// Length of the longest track in seconds; 0 when nothing is loaded.
    pub fn duration(&self) -> f64 {
        self.tracks
            .iter()
            .map(Track::duration_secs)
            .fold(0.0, f64::max)
    }

    /// Position read back from the bus clock.
    pub fn current_time(&self) -> f64 {
        match self.bus.as_ref() {
            Some(bus) if bus.sample_rate() > 0 => bus.elapsed() as f64 / bus.sample_rate() as f64,
            _ => 0.0,
        }
    }

    /// Frames rendered by the device, when one is pulling.
    pub fn audio_clock(&self) -> Option<u64> {
        self.bus.as_ref().filter(|b| b.is_live()).map(MixHandle::clock)
    }

    #[cfg(test)]
    pub fn is_output_live(&self) -> bool {
        self.bus.as_ref().is_some_and(MixHandle::is_live)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track_infos(&self) -> Vec<TrackInfo> {
        self.tracks.iter().map(Track::info).collect()
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn set_muted(&mut self, id: TrackId, muted: bool) -> bool {
        let Some(track) = self.track_mut(id) else {
            return false;
        };
        track.flags.muted = muted;
        self.apply_gains();
        true
    }

    pub fn set_solo(&mut self, id: TrackId, solo: bool) -> bool {
        let Some(track) = self.track_mut(id) else {
            return false;
        };
        track.flags.solo = solo;
        self.apply_gains();
        true
    }

    /// Set the user fader of one track, clamped to `[0, 1]`.
    pub fn set_volume(&mut self, id: TrackId, volume: f32) -> bool {
        let Some(track) = self.track_mut(id) else {
            return false;
        };
        track.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.apply_gains();
        true
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        let gain = if gain.is_finite() { gain.max(0.0) } else { 1.0 };
        self.master_gain = gain;
        self.output.set_master_gain(gain);
    }

    pub fn set_waveform(&mut self, id: TrackId, slot: WaveformSlot) -> bool {
        match self.track_mut(id) {
            Some(track) => {
                track.waveform = slot;
                true
            }
            None => false,
        }
    }

    /// Re-run mute/solo resolution over the whole set and write every node gain.
    fn apply_gains(&mut self) {
        let flags: Vec<MixFlags> = self.tracks.iter().map(|t| t.flags).collect();
        let solo = any_solo(&flags);
        for (track, audible) in self.tracks.iter_mut().zip(resolve_all(&flags)) {
            track.gain = track.volume * audible;
            if let Some(bus) = self.bus.as_ref() {
                bus.set_gain(track.node, track.gain);
            }
        }
        debug!("gains applied (solo active: {solo})");
    }
}

impl Drop for PlaybackGraph {
    fn drop(&mut self) {
        self.unload();
    }
}
