//! Error taxonomy for the stem engine.
//!
//! Each enum maps to one failure domain: folder loading aborts on
//! `LoadError`, a single file is skipped on `DecodeError`, a waveform slot
//! is marked unavailable on `ExtractError`, and the transport reports a
//! stall on `DeviceError`. None of them are fatal to the engine itself.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The folder handed to the loader could not be enumerated.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("not a folder: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read folder {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A single audio file could not be turned into a playable stem.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported or corrupt audio in {}: {source}", path.display())]
    Unsupported {
        path: PathBuf,
        #[source]
        source: rodio::decoder::DecoderError,
    },

    #[error("{} has no audio track", .0.display())]
    NoAudio(PathBuf),

    #[error("{} runs at {found} Hz but the session runs at {expected} Hz", path.display())]
    FormatMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
}

/// Waveform extraction failed; the track keeps playing without a waveform.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("no samples decoded from {}", .0.display())]
    EmptyStream(PathBuf),

    #[error("extraction cancelled")]
    Cancelled,
}

/// Output hardware or the real-time command path failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    #[error("audio thread is not draining commands")]
    QueueFull,

    #[error("audio output stalled")]
    Stalled,

    #[error("mix bus holds at most {0} stems")]
    NodeLimit(usize),
}
