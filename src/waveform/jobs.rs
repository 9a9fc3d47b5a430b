use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::error::ExtractError;

use super::extract::extract;
use super::model::WaveformData;

/// One extraction request. `cancel` is shared by every job of a session.
pub struct WaveformJob {
    pub label: String,
    pub path: PathBuf,
    pub target_peaks: usize,
    pub cancel: Arc<AtomicBool>,
}

/// Run `job` on its own thread and hand the result to `done`.
pub fn spawn_extraction<F>(job: WaveformJob, done: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce(Result<WaveformData, ExtractError>) + Send + 'static,
{
    thread::Builder::new()
        .name(format!("waveform-{}", job.label))
        .spawn(move || {
            let result = extract(&job.path, job.target_peaks, &job.cancel);
            match &result {
                Ok(w) => debug!(
                    "waveform {}: {} peaks from {} samples ({:.2}s)",
                    job.path.display(),
                    w.peaks.len(),
                    w.total_samples,
                    w.duration
                ),
                Err(ExtractError::Cancelled) => debug!("waveform {} cancelled", job.path.display()),
                Err(e) => warn!("waveform unavailable for {}: {e}", job.path.display()),
            }
            done(result);
        })
}
