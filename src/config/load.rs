use std::{env, path::PathBuf};

use super::schema::Settings;

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix `STEMPLAY__`), then an
/// optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("STEMPLAY")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.transport.tick_hz == 0 {
            return Err("transport.tick_hz must be >= 1".to_string());
        }
        if self.waveform.target_peaks == 0 {
            return Err("waveform.target_peaks must be >= 1".to_string());
        }
        if !self.audio.master_gain.is_finite() || self.audio.master_gain < 0.0 {
            return Err("audio.master_gain must be a finite value >= 0".to_string());
        }
        Ok(())
    }
}

/// Resolve the config path from `STEMPLAY_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("STEMPLAY_CONFIG_PATH") {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/stemplay/config.toml`
/// or `~/.config/stemplay/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", ".config").map(|d| d.join("stemplay").join("config.toml"))
}

/// Compute the default log path under `$XDG_STATE_HOME/stemplay/stemplay.log`
/// or `~/.local/state/stemplay/stemplay.log`.
pub fn default_log_path() -> Option<PathBuf> {
    xdg_dir("XDG_STATE_HOME", ".local/state").map(|d| d.join("stemplay").join("stemplay.log"))
}

fn xdg_dir(var: &str, home_fallback: &str) -> Option<PathBuf> {
    if let Some(xdg) = env::var_os(var) {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(home_fallback))
    }
}
