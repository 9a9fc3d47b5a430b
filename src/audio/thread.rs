use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::Settings;
use crate::error::ExtractError;
use crate::waveform::{WaveformJob, spawn_extraction};

use super::coalesce::coalesce_scrubs;
use super::graph::{LoadReport, PlaybackGraph};
use super::output::AudioOutput;
use super::track::{TrackId, WaveformSlot};
use super::transport::TransportController;
use super::types::{ControlCmd, StatusHandle, TrackListHandle, TransportStatus};

/// Spawn the control thread.
///
/// `make_output` runs on the new thread: rodio's stream has to be created
/// (and dropped) on the thread that uses it.
pub(super) fn spawn_control_thread<F>(
    make_output: F,
    settings: Settings,
    rx: Receiver<ControlCmd>,
    tx: Sender<ControlCmd>,
    status: StatusHandle,
    tracks: TrackListHandle,
) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() -> Box<dyn AudioOutput> + Send + 'static,
{
    thread::Builder::new()
        .name("stemplay-control".to_string())
        .spawn(move || {
            let graph = PlaybackGraph::new(
                make_output(),
                settings.audio.master_gain,
                Duration::from_millis(settings.audio.start_lead_ms),
            );
            let mut actor = ControlActor {
                controller: TransportController::new(graph, &settings.transport),
                tx,
                status,
                tracks,
                target_peaks: settings.waveform.target_peaks,
                session: 0,
                cancel: Arc::new(AtomicBool::new(false)),
                folder: None,
                message: None,
                tracks_dirty: true,
            };
            actor.run(rx);
        })
}

struct ControlActor {
    controller: TransportController,
    /// Loops back into our own queue; waveform jobs report through it.
    tx: Sender<ControlCmd>,
    status: StatusHandle,
    tracks: TrackListHandle,
    target_peaks: usize,
    session: u64,
    cancel: Arc<AtomicBool>,
    folder: Option<PathBuf>,
    message: Option<String>,
    tracks_dirty: bool,
}

impl ControlActor {
    fn run(&mut self, rx: Receiver<ControlCmd>) {
        self.publish();
        loop {
            let first = match self.controller.tick_handle() {
                Some(tick) => {
                    let wait = tick.next_due.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(wait) {
                        Ok(cmd) => Some(cmd),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                },
            };

            if let Some(first) = first {
                let mut batch = vec![first];
                batch.extend(rx.try_iter());
                for cmd in coalesce_scrubs(batch) {
                    if !self.apply(cmd) {
                        self.shutdown();
                        return;
                    }
                }
            }

            self.fire_due_ticks();
            self.publish();
        }
        self.shutdown();
    }

    /// Apply one command. Returns `false` on quit.
    fn apply(&mut self, cmd: ControlCmd) -> bool {
        match cmd {
            ControlCmd::LoadFolder { folder, paths } => self.load(folder, paths),
            ControlCmd::TogglePlay => self.controller.toggle_play(),
            ControlCmd::BeginScrub(p) => self.controller.begin_scrub(p),
            ControlCmd::Scrub(p) => self.controller.scrub(p),
            ControlCmd::EndScrub(p) => self.controller.end_scrub(p),
            ControlCmd::Seek(p) => self.controller.seek(p),
            ControlCmd::SeekBy(secs) => self.controller.seek_by(secs),
            ControlCmd::ToggleMute(id) => {
                if let Some(flags) = self.flags_of(id) {
                    self.tracks_dirty |= self.controller.set_muted(id, !flags.muted);
                }
            }
            ControlCmd::ToggleSolo(id) => {
                if let Some(flags) = self.flags_of(id) {
                    self.tracks_dirty |= self.controller.set_solo(id, !flags.solo);
                }
            }
            ControlCmd::SetVolume(id, volume) => {
                self.tracks_dirty |= self.controller.set_volume(id, volume);
            }
            ControlCmd::SetMasterGain(gain) => self.controller.set_master_gain(gain),
            ControlCmd::WaveformReady {
                session,
                track,
                result,
            } => self.waveform_ready(session, track, result),
            ControlCmd::Quit => return false,
        }
        true
    }

    fn flags_of(&self, id: TrackId) -> Option<super::resolve::MixFlags> {
        self.controller
            .graph()
            .tracks()
            .iter()
            .find(|t| t.id() == id)
            .map(|t| t.flags())
    }

    fn load(&mut self, folder: PathBuf, paths: Vec<PathBuf>) {
        // In-flight extractions of the previous session stop early and their
        // results are discarded by session number.
        self.cancel.store(true, Ordering::Relaxed);
        self.cancel = Arc::new(AtomicBool::new(false));
        self.session += 1;

        info!("loading {} ({} candidates)", folder.display(), paths.len());
        let report = self.controller.load_folder(&paths);
        self.message = Some(summarize_load(&report));
        self.folder = Some(folder);
        self.tracks_dirty = true;
        self.spawn_waveforms();
    }

    fn spawn_waveforms(&mut self) {
        let jobs: Vec<(TrackId, PathBuf)> = self
            .controller
            .graph()
            .tracks()
            .iter()
            .map(|t| (t.id(), t.path().clone()))
            .collect();

        for (id, path) in jobs {
            let job = WaveformJob {
                label: id.0.to_string(),
                path,
                target_peaks: self.target_peaks,
                cancel: self.cancel.clone(),
            };
            let tx = self.tx.clone();
            let session = self.session;
            let spawned = spawn_extraction(job, move |result| {
                let _ = tx.send(ControlCmd::WaveformReady {
                    session,
                    track: id,
                    result,
                });
            });
            if let Err(e) = spawned {
                warn!("cannot start waveform job for track {id}: {e}");
                self.controller.set_waveform(id, WaveformSlot::Unavailable);
            }
        }
    }

    fn waveform_ready(
        &mut self,
        session: u64,
        track: TrackId,
        result: Result<crate::waveform::WaveformData, ExtractError>,
    ) {
        if session != self.session {
            debug!("dropping waveform for track {track} from session {session}");
            return;
        }
        let slot = match result {
            Ok(data) => WaveformSlot::Ready(Arc::new(data)),
            Err(ExtractError::Cancelled) => return,
            Err(_) => WaveformSlot::Unavailable,
        };
        self.tracks_dirty |= self.controller.set_waveform(track, slot);
    }

    fn fire_due_ticks(&mut self) {
        while let Some(tick) = self.controller.tick_handle() {
            if tick.next_due > Instant::now() {
                break;
            }
            self.controller.on_tick(tick.id);
        }
    }

    fn publish(&mut self) {
        let stall = self.controller.stall();
        let message = match stall {
            Some(e) => Some(format!("playback paused: {e}")),
            None => self.message.clone(),
        };
        if let Ok(mut s) = self.status.lock() {
            *s = TransportStatus {
                state: self.controller.state(),
                position: self.controller.position(),
                duration: self.controller.duration(),
                audio_time: self.controller.current_time(),
                master_gain: self.controller.graph().master_gain(),
                folder: self.folder.clone(),
                message,
                stalled: stall.is_some(),
            };
        }
        if self.tracks_dirty {
            if let Ok(mut t) = self.tracks.lock() {
                *t = self.controller.tracks();
                self.tracks_dirty = false;
            }
        }
    }

    fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.controller.stop();
        self.publish();
        debug!("control thread exiting");
    }
}

fn summarize_load(report: &LoadReport) -> String {
    match report.skipped.len() {
        0 => format!("{} stems loaded", report.loaded.len()),
        n => {
            let first = report
                .skipped
                .first()
                .map(|(_, reason)| reason.to_string())
                .unwrap_or_default();
            format!(
                "{} stems loaded, {n} skipped ({first})",
                report.loaded.len()
            )
        }
    }
}
