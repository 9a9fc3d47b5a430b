//! Transport state machine.
//!
//! `Stopped`, `Playing` and `Scrubbing`, plus the periodic position tick that
//! runs only while playing. The controller owns the playback graph; every
//! start, stop and seek goes through it so the whole track set moves together.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::TransportSettings;
use crate::error::DeviceError;

use super::graph::{LoadReport, PlaybackGraph};
use super::track::{TrackId, TrackInfo, WaveformSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Scrubbing,
}

/// The single live position tick. Only a tick carrying the current `id` may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHandle {
    pub id: u64,
    pub next_due: Instant,
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

pub struct TransportController {
    graph: PlaybackGraph,
    state: TransportState,
    position: f64,
    resume_after_scrub: bool,
    tick: Option<TickHandle>,
    tick_seq: u64,
    interval: Duration,
    live_scrub: bool,
    stall_ticks: u32,
    last_clock: Option<u64>,
    idle_ticks: u32,
    stall: Option<DeviceError>,
}

impl TransportController {
    pub fn new(graph: PlaybackGraph, settings: &TransportSettings) -> Self {
        let hz = settings.tick_hz.max(1);
        Self {
            graph,
            state: TransportState::Stopped,
            position: 0.0,
            resume_after_scrub: false,
            tick: None,
            tick_seq: 0,
            interval: Duration::from_secs_f64(1.0 / hz as f64),
            live_scrub: settings.live_scrub,
            stall_ticks: settings.stall_ticks,
            last_clock: None,
            idle_ticks: 0,
            stall: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Transport position in seconds.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.graph.duration()
    }

    /// Position as heard from the audio clock.
    pub fn current_time(&self) -> f64 {
        self.graph.current_time()
    }

    pub fn stall(&self) -> Option<&DeviceError> {
        self.stall.as_ref()
    }

    #[cfg(test)]
    pub fn tick_interval(&self) -> Duration {
        self.interval
    }

    pub fn tick_handle(&self) -> Option<TickHandle> {
        self.tick
    }

    pub fn graph(&self) -> &PlaybackGraph {
        &self.graph
    }

    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.graph.track_infos()
    }

    /// Replace the session. The transport settles in `Stopped` at 0.
    pub fn load_folder(&mut self, paths: &[PathBuf]) -> LoadReport {
        self.cancel_tick();
        self.state = TransportState::Stopped;
        self.position = 0.0;
        self.resume_after_scrub = false;
        self.stall = None;
        self.graph.load_folder(paths)
    }

    pub fn play(&mut self) {
        match self.state {
            TransportState::Playing => return,
            TransportState::Scrubbing => {
                debug!("play ignored while scrubbing");
                return;
            }
            TransportState::Stopped => {}
        }
        if self.graph.is_empty() {
            return;
        }
        if self.position >= self.duration() {
            self.position = 0.0;
        }
        self.start_playing();
    }

    pub fn stop(&mut self) {
        if let Err(e) = self.graph.reposition(0.0, false) {
            warn!("stop: {e}");
        }
        self.cancel_tick();
        if self.state != TransportState::Stopped {
            info!("transport stopped");
        }
        self.state = TransportState::Stopped;
        self.position = 0.0;
        self.resume_after_scrub = false;
    }

    pub fn toggle_play(&mut self) {
        match self.state {
            TransportState::Playing => self.stop(),
            _ => self.play(),
        }
    }

    pub fn begin_scrub(&mut self, progress: f64) {
        if self.state == TransportState::Scrubbing {
            self.scrub(progress);
            return;
        }
        self.resume_after_scrub = self.state == TransportState::Playing;
        if let Err(e) = self.graph.stop() {
            warn!("begin scrub: {e}");
        }
        self.cancel_tick();
        self.state = TransportState::Scrubbing;
        self.position = clamp_progress(progress) * self.duration();
        debug!(
            "scrub started at {:.2}s (resume: {})",
            self.position, self.resume_after_scrub
        );
        if self.live_scrub {
            self.preview();
        }
    }

    pub fn scrub(&mut self, progress: f64) {
        if self.state != TransportState::Scrubbing {
            return;
        }
        self.position = clamp_progress(progress) * self.duration();
        if self.live_scrub {
            self.preview();
        }
    }

    pub fn end_scrub(&mut self, progress: f64) {
        if self.state != TransportState::Scrubbing {
            self.begin_scrub(progress);
        }
        self.position = clamp_progress(progress) * self.duration();
        self.state = TransportState::Stopped;
        let resume = std::mem::take(&mut self.resume_after_scrub);

        if resume && self.position >= self.duration() {
            self.stop();
        } else if resume {
            self.start_playing();
        } else if let Err(e) = self.graph.reposition(self.position, false) {
            warn!("end scrub: {e}");
        }
    }

    /// Jump to `progress` without leaving the current state.
    pub fn seek(&mut self, progress: f64) {
        match self.state {
            TransportState::Scrubbing => self.scrub(progress),
            TransportState::Playing => {
                self.position = clamp_progress(progress) * self.duration();
                if self.position >= self.duration() {
                    self.stop();
                } else {
                    self.start_playing();
                }
            }
            TransportState::Stopped => {
                self.position = clamp_progress(progress) * self.duration();
                if let Err(e) = self.graph.reposition(self.position, false) {
                    warn!("seek: {e}");
                }
            }
        }
    }

    /// Seek relative to the current position.
    pub fn seek_by(&mut self, delta_secs: f64) {
        let duration = self.duration();
        if duration <= 0.0 {
            return;
        }
        self.seek((self.position + delta_secs) / duration);
    }

    pub fn set_muted(&mut self, id: TrackId, muted: bool) -> bool {
        self.graph.set_muted(id, muted)
    }

    pub fn set_solo(&mut self, id: TrackId, solo: bool) -> bool {
        self.graph.set_solo(id, solo)
    }

    pub fn set_volume(&mut self, id: TrackId, volume: f32) -> bool {
        self.graph.set_volume(id, volume)
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.graph.set_master_gain(gain);
    }

    pub fn set_waveform(&mut self, id: TrackId, slot: WaveformSlot) -> bool {
        self.graph.set_waveform(id, slot)
    }

    /// Advance the position if `id` is the live tick. Stale ticks and ticks
    /// outside `Playing` do nothing.
    pub fn on_tick(&mut self, id: u64) {
        let Some(tick) = self.tick.as_mut() else {
            return;
        };
        if tick.id != id || self.state != TransportState::Playing {
            return;
        }
        tick.next_due += self.interval;

        self.position += self.interval.as_secs_f64();
        if self.position >= self.duration() {
            info!("reached end of stems");
            self.stop();
            return;
        }
        self.watch_clock();
    }

    fn start_playing(&mut self) {
        let started = self
            .graph
            .reposition(self.position, false)
            .and_then(|()| self.graph.play());
        match started {
            Ok(()) => {
                self.state = TransportState::Playing;
                self.stall = None;
                self.restart_tick();
                info!("playing from {:.2}s", self.position);
            }
            Err(e) => {
                warn!("cannot start playback: {e}");
                self.cancel_tick();
                self.state = TransportState::Stopped;
                self.stall = Some(e);
            }
        }
    }

    fn preview(&mut self) {
        if let Err(e) = self.graph.reposition(self.position, true) {
            debug!("scrub preview: {e}");
        }
    }

    fn restart_tick(&mut self) {
        self.tick_seq += 1;
        self.tick = Some(TickHandle {
            id: self.tick_seq,
            next_due: Instant::now() + self.interval,
        });
        self.last_clock = self.graph.audio_clock();
        self.idle_ticks = 0;
    }

    fn cancel_tick(&mut self) {
        self.tick = None;
        self.idle_ticks = 0;
    }

    /// Pause when the device has not rendered a frame for `stall_ticks` ticks.
    fn watch_clock(&mut self) {
        if self.stall_ticks == 0 {
            return;
        }
        let Some(clock) = self.graph.audio_clock() else {
            return;
        };
        if self.last_clock == Some(clock) {
            self.idle_ticks += 1;
        } else {
            self.last_clock = Some(clock);
            self.idle_ticks = 0;
        }
        if self.idle_ticks >= self.stall_ticks {
            warn!(
                "audio clock stuck for {} ticks, pausing at {:.2}s",
                self.idle_ticks, self.position
            );
            if let Err(e) = self.graph.reposition(self.position, false) {
                debug!("pause after stall: {e}");
            }
            self.cancel_tick();
            self.state = TransportState::Stopped;
            self.stall = Some(DeviceError::Stalled);
        }
    }
}
