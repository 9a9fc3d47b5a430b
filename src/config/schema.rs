use std::path::PathBuf;

use serde::Deserialize;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/stemplay/config.toml` or `~/.config/stemplay/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `STEMPLAY__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub transport: TransportSettings,
    pub waveform: WaveformSettings,
    pub library: LibrarySettings,
    pub controls: ControlsSettings,
    pub ui: UiSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Gain applied to the summed mix at the output (1.0 = unity).
    pub master_gain: f32,
    /// Delay between issuing a start and the shared start frame (milliseconds).
    /// Set to 0 to start on the next rendered frame.
    pub start_lead_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_gain: 1.0,
            start_lead_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Position tick rate while playing.
    pub tick_hz: u32,
    /// Re-seek the audio while scrubbing instead of staying silent until release.
    pub live_scrub: bool,
    /// Consecutive ticks without audio clock progress before playback is reported stalled.
    /// Set to 0 to disable stall detection.
    pub stall_ticks: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            tick_hz: 30,
            live_scrub: false,
            stall_ticks: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaveformSettings {
    /// Number of peaks to reduce each stem to.
    pub target_peaks: usize,
}

impl Default for WaveformSettings {
    fn default() -> Self {
        Self { target_peaks: 1500 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec![
                "wav".into(),
                "aif".into(),
                "aiff".into(),
                "mp3".into(),
                "m4a".into(),
            ],
            follow_links: true,
            include_hidden: false,
            recursive: false,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlsSettings {
    /// Number of seconds to scrub when pressing `h` / `l`.
    pub scrub_seconds: u64,
    /// Track volume change per `+` / `-` press.
    pub volume_step: f32,
    /// Master gain change per `[` / `]` press.
    pub master_step: f32,
}

impl Default for ControlsSettings {
    fn default() -> Self {
        Self {
            scrub_seconds: 5,
            volume_step: 0.05,
            master_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// The text rendered inside the top header box.
    pub header_text: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            header_text: " ~ every stem, one playhead ~ ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter when `RUST_LOG` is unset (e.g. "info", "stemplay=debug").
    pub level: String,
    /// Log file; defaults to `$XDG_STATE_HOME/stemplay/stemplay.log`.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
