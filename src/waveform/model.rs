/// Display data for one stem: RMS peaks normalized to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformData {
    pub peaks: Vec<f32>,
    /// Number of decoded samples (all channels, interleaved).
    pub total_samples: usize,
    /// Source duration in seconds.
    pub duration: f64,
}

/// Samples per bucket so that roughly `target` buckets cover `total` samples.
pub fn bucket_size(total: usize, target: usize) -> usize {
    (total / target.max(1)).max(1)
}

/// Root-mean-square magnitude of each contiguous `size`-sample bucket. The
/// last bucket may be shorter. Non-finite samples count as silence.
pub fn bucket_rms(samples: &[f32], size: usize) -> Vec<f32> {
    samples
        .chunks(size.max(1))
        .map(|bucket| {
            let sum: f64 = bucket
                .iter()
                .map(|&s| if s.is_finite() { s as f64 } else { 0.0 })
                .map(|s| s * s)
                .sum();
            (sum / bucket.len() as f64).sqrt() as f32
        })
        .collect()
}

/// Scale so the loudest bucket is exactly 1.0. All-zero input stays zero.
pub fn normalize(peaks: &mut [f32]) {
    let max = peaks.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return;
    }
    for p in peaks.iter_mut() {
        *p /= max;
    }
}
