//! Decoded stem buffers.
//!
//! A stem is decoded once, fully, when its folder is loaded. The buffer is
//! shared read-only between the control thread and the mix bus.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rodio::{Decoder, Source};

use crate::error::DecodeError;

pub(crate) type FileDecoder = Decoder<BufReader<File>>;

/// Open `path` for streaming decode.
pub(crate) fn open_decoder(path: &Path) -> Result<FileDecoder, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|source| DecodeError::Unsupported {
        path: path.to_path_buf(),
        source,
    })?;
    if decoder.channels() == 0 || decoder.sample_rate() == 0 {
        return Err(DecodeError::NoAudio(path.to_path_buf()));
    }
    Ok(decoder)
}

/// Interleaved `f32` samples of one stem plus their format.
#[derive(Debug)]
pub struct StemAudio {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
    frames: u64,
}

impl StemAudio {
    pub fn decode(path: &Path) -> Result<Self, DecodeError> {
        let decoder = open_decoder(path)?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.collect();
        Ok(Self::from_samples(samples, channels, sample_rate))
    }

    /// Wrap already decoded interleaved samples. A trailing partial frame is dropped.
    pub fn from_samples(mut samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels as usize;
        samples.truncate(frames * channels as usize);
        Self {
            samples: samples.into(),
            channels,
            sample_rate,
            frames: frames as u64,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    /// The stereo pair at `frame`. Mono is duplicated, extra channels beyond
    /// the first two are ignored.
    #[inline]
    pub fn stereo_frame(&self, frame: u64) -> (f32, f32) {
        let ch = self.channels as usize;
        let base = frame as usize * ch;
        match self.samples.get(base..base + ch) {
            Some([mono]) => (*mono, *mono),
            Some([l, r, ..]) => (*l, *r),
            _ => (0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_samples_counts_frames_and_drops_partial_frame() {
        let stem = StemAudio::from_samples(vec![0.1, 0.2, 0.3, 0.4, 0.5], 2, 8_000);
        assert_eq!(stem.frames(), 2);
        assert_eq!(stem.stereo_frame(1), (0.3, 0.4));
        assert_eq!(stem.stereo_frame(2), (0.0, 0.0));
    }

    #[test]
    fn mono_is_duplicated_to_both_sides() {
        let stem = StemAudio::from_samples(vec![0.25, -0.5], 1, 8_000);
        assert_eq!(stem.stereo_frame(1), (-0.5, -0.5));
    }

    #[test]
    fn duration_is_frames_over_rate() {
        let stem = StemAudio::from_samples(vec![0.0; 16_000], 2, 8_000);
        assert_eq!(stem.duration_secs(), 1.0);
    }

    #[test]
    fn decode_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not riff data").unwrap();
        assert!(matches!(
            StemAudio::decode(&path),
            Err(DecodeError::Unsupported { .. })
        ));
    }

    #[test]
    fn decode_reports_missing_file_as_open_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StemAudio::decode(&dir.path().join("gone.wav")),
            Err(DecodeError::Open { .. })
        ));
    }
}
