use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::time::Duration;

use approx::assert_relative_eq;
use tempfile::TempDir;

use super::extract::{extract, summarize};
use super::model::{bucket_rms, bucket_size, normalize};
use super::*;
use crate::error::ExtractError;

fn write_wav(dir: &Path, name: &str, frames: usize, sample: impl Fn(usize) -> f32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 8000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut w = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..frames {
        let s = sample(i);
        w.write_sample(s).unwrap();
        w.write_sample(s).unwrap();
    }
    w.finalize().unwrap();
    path
}

#[test]
fn bucket_size_never_drops_below_one() {
    assert_eq!(bucket_size(10_000, 100), 100);
    assert_eq!(bucket_size(10, 100), 1);
    assert_eq!(bucket_size(10, 0), 10);
}

#[test]
fn bucket_rms_keeps_a_short_tail() {
    let peaks = bucket_rms(&[3.0, -4.0, 1.0], 2);
    assert_eq!(peaks.len(), 2);
    assert_relative_eq!(peaks[0], (12.5f32).sqrt(), epsilon = 1e-6);
    assert_relative_eq!(peaks[1], 1.0, epsilon = 1e-6);
}

#[test]
fn non_finite_samples_count_as_silence() {
    let samples = [f32::NAN, 0.5, f32::INFINITY, f32::NEG_INFINITY, 0.0, 0.25];
    let mut peaks = bucket_rms(&samples, 2);
    assert_relative_eq!(peaks[0], (0.125f32).sqrt(), epsilon = 1e-6);
    assert_eq!(peaks[1], 0.0);
    normalize(&mut peaks);
    assert!(peaks.iter().all(|p| (0.0..=1.0).contains(p)));
    assert_eq!(peaks[0], 1.0);

    let data = summarize(&samples, 1.0, 3, Path::new("nan.wav")).unwrap();
    assert!(data.peaks.iter().all(|p| p.is_finite()));
}

#[test]
fn normalize_scales_loudest_to_one() {
    let mut peaks = vec![0.25, 0.5, 0.1];
    normalize(&mut peaks);
    assert_relative_eq!(peaks[1], 1.0);
    assert_relative_eq!(peaks[0], 0.5);

    let mut silent = vec![0.0; 4];
    normalize(&mut silent);
    assert!(silent.iter().all(|&p| p == 0.0));
}

#[test]
fn summarize_rejects_empty_input() {
    let err = summarize(&[], 0.0, 100, Path::new("empty.wav")).unwrap_err();
    assert!(matches!(err, ExtractError::EmptyStream(p) if p == Path::new("empty.wav")));
}

#[test]
fn extract_reads_peaks_and_duration() {
    let dir = TempDir::new().unwrap();
    // First half silent, second half loud.
    let path = write_wav(dir.path(), "half.wav", 8000, |i| if i < 4000 { 0.0 } else { 0.5 });

    let cancel = AtomicBool::new(false);
    let data = extract(&path, 100, &cancel).unwrap();

    assert_eq!(data.total_samples, 16_000);
    assert_relative_eq!(data.duration, 1.0, epsilon = 1e-3);
    assert_eq!(data.peaks.len(), 100);
    assert_relative_eq!(data.peaks[0], 0.0);
    assert_relative_eq!(data.peaks[99], 1.0, epsilon = 1e-6);
    assert!(data.peaks.iter().all(|&p| (0.0..=1.0).contains(&p)));
}

#[test]
fn extract_honours_a_raised_cancel_flag() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(dir.path(), "tone.wav", 800, |_| 0.2);

    let cancel = AtomicBool::new(true);
    assert!(matches!(
        extract(&path, 100, &cancel),
        Err(ExtractError::Cancelled)
    ));
}

#[test]
fn extract_reports_undecodable_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("junk.wav");
    std::fs::write(&path, b"definitely not audio").unwrap();

    let cancel = AtomicBool::new(false);
    assert!(matches!(
        extract(&path, 100, &cancel),
        Err(ExtractError::Decode(_))
    ));
}

#[test]
fn spawned_job_delivers_its_result() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(dir.path(), "bg.wav", 1600, |i| (i % 7) as f32 / 10.0);

    let (tx, rx) = mpsc::channel();
    let job = WaveformJob {
        label: "bg".to_string(),
        path,
        target_peaks: 50,
        cancel: Arc::new(AtomicBool::new(false)),
    };
    let handle = spawn_extraction(job, move |result| {
        let _ = tx.send(result);
    })
    .unwrap();

    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    handle.join().unwrap();
    let data = result.unwrap();
    assert_eq!(data.peaks.len(), 50);
    assert!(data.peaks.iter().any(|&p| p == 1.0));
}
