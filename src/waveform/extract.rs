use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use rodio::Source;

use crate::audio::open_decoder;
use crate::error::ExtractError;

use super::model::{WaveformData, bucket_rms, bucket_size, normalize};

/// Samples decoded between two looks at the cancellation flag.
const CANCEL_CHECK_INTERVAL: usize = 1 << 16;

/// Decode `path` in one pass and reduce it to about `target` peaks.
pub fn extract(
    path: &Path,
    target: usize,
    cancel: &AtomicBool,
) -> Result<WaveformData, ExtractError> {
    let decoder = open_decoder(path)?;
    let channels = decoder.channels().max(1) as f64;
    let rate = decoder.sample_rate() as f64;
    let reported = decoder.total_duration().map(|d| d.as_secs_f64());

    let mut samples: Vec<f32> = Vec::new();
    for sample in decoder {
        samples.push(sample);
        if samples.len() % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            return Err(ExtractError::Cancelled);
        }
    }
    if cancel.load(Ordering::Relaxed) {
        return Err(ExtractError::Cancelled);
    }

    let duration = reported.unwrap_or_else(|| samples.len() as f64 / (rate * channels));
    summarize(&samples, duration, target, path)
}

/// Reduce already decoded samples.
pub fn summarize(
    samples: &[f32],
    duration: f64,
    target: usize,
    path: &Path,
) -> Result<WaveformData, ExtractError> {
    if samples.is_empty() {
        return Err(ExtractError::EmptyStream(path.to_path_buf()));
    }
    let mut peaks = bucket_rms(samples, bucket_size(samples.len(), target));
    normalize(&mut peaks);
    Ok(WaveformData {
        peaks,
        total_samples: samples.len(),
        duration,
    })
}
