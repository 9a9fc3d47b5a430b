//! Waveform extraction.
//!
//! Each stem is decoded once more on a background thread and reduced to a
//! short list of RMS peaks for display. Extraction never touches the
//! playback graph; results travel back to the control thread as messages.

mod extract;
mod jobs;
mod model;

pub use jobs::{WaveformJob, spawn_extraction};
pub use model::WaveformData;

#[cfg(test)]
mod tests;
