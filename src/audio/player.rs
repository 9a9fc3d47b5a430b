use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::Settings;

use super::output::{AudioOutput, RodioOutput};
use super::thread::spawn_control_thread;
use super::types::{ControlCmd, StatusHandle, TrackListHandle, TransportStatus};

/// Front handle of the stem engine. Commands are fire-and-forget; state is
/// observed through the published handles.
pub struct StemPlayer {
    tx: Sender<ControlCmd>,
    status: StatusHandle,
    tracks: TrackListHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl StemPlayer {
    /// Start the engine on the default audio device.
    pub fn new(settings: &Settings) -> io::Result<Self> {
        let master_gain = settings.audio.master_gain;
        Self::with_output(settings, move || {
            Box::new(RodioOutput::open_default(master_gain)) as Box<dyn AudioOutput>
        })
    }

    /// Start the engine on the output produced by `make_output`.
    pub fn with_output<F>(settings: &Settings, make_output: F) -> io::Result<Self>
    where
        F: FnOnce() -> Box<dyn AudioOutput> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<ControlCmd>();
        let status: StatusHandle = Arc::new(Mutex::new(TransportStatus::default()));
        let tracks: TrackListHandle = Arc::new(Mutex::new(Vec::new()));

        let join = spawn_control_thread(
            make_output,
            settings.clone(),
            rx,
            tx.clone(),
            status.clone(),
            tracks.clone(),
        )?;

        Ok(Self {
            tx,
            status,
            tracks,
            join: Mutex::new(Some(join)),
        })
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn tracks_handle(&self) -> TrackListHandle {
        self.tracks.clone()
    }

    pub fn send(&self, cmd: ControlCmd) -> Result<(), mpsc::SendError<ControlCmd>> {
        self.tx.send(cmd)
    }

    pub fn load_folder(
        &self,
        folder: PathBuf,
        paths: Vec<PathBuf>,
    ) -> Result<(), mpsc::SendError<ControlCmd>> {
        self.send(ControlCmd::LoadFolder { folder, paths })
    }

    /// Stop playback and wait for the control thread to exit.
    pub fn shutdown(&self) {
        let _ = self.send(ControlCmd::Quit);

        if let Ok(mut j) = self.join.lock() {
            if let Some(h) = j.take() {
                let _ = h.join();
            }
        }
    }
}

impl Drop for StemPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
