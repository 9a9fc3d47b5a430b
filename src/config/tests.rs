use super::load::{default_config_path, default_log_path, resolve_config_path};
use super::schema::*;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

#[test]
fn resolve_config_path_prefers_stemplay_config_path() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("STEMPLAY_CONFIG_PATH", "/tmp/stemplay-test-config.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/stemplay-test-config.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    assert_eq!(
        default_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("stemplay")
            .join("config.toml")
    );
}

#[test]
fn default_log_path_falls_back_to_home_local_state() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_STATE_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    assert_eq!(
        default_log_path().unwrap(),
        std::path::PathBuf::from("/tmp/home-dir")
            .join(".local/state")
            .join("stemplay")
            .join("stemplay.log")
    );
}

#[test]
fn defaults_match_stem_player_expectations() {
    let s = Settings::default();
    assert_eq!(s.transport.tick_hz, 30);
    assert!(!s.transport.live_scrub);
    assert_eq!(s.waveform.target_peaks, 1500);
    assert_eq!(
        s.library.extensions,
        vec!["wav", "aif", "aiff", "mp3", "m4a"]
    );
    assert!(!s.library.recursive);
    assert!(s.validate().is_ok());
}

#[test]
fn validate_rejects_zero_tick_rate_and_bad_gain() {
    let mut s = Settings::default();
    s.transport.tick_hz = 0;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.audio.master_gain = f32::NAN;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.waveform.target_peaks = 0;
    assert!(s.validate().is_err());
}

#[test]
fn settings_load_from_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[audio]
master_gain = 0.5
start_lead_ms = 20

[transport]
tick_hz = 60
live_scrub = true
stall_ticks = 0

[waveform]
target_peaks = 800

[library]
extensions = ["wav"]
recursive = true
max_depth = 2

[controls]
scrub_seconds = 9
volume_step = 0.1

[ui]
header_text = "hello"

[log]
level = "debug"
file = "/tmp/stemplay.log"
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("STEMPLAY_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("STEMPLAY__TRANSPORT__TICK_HZ");

    let s = Settings::load().unwrap();
    assert_eq!(s.audio.master_gain, 0.5);
    assert_eq!(s.audio.start_lead_ms, 20);
    assert_eq!(s.transport.tick_hz, 60);
    assert!(s.transport.live_scrub);
    assert_eq!(s.transport.stall_ticks, 0);
    assert_eq!(s.waveform.target_peaks, 800);
    assert_eq!(s.library.extensions, vec!["wav".to_string()]);
    assert!(s.library.recursive);
    assert_eq!(s.library.max_depth, Some(2));
    assert_eq!(s.controls.scrub_seconds, 9);
    assert_eq!(s.controls.volume_step, 0.1);
    assert_eq!(s.ui.header_text, "hello");
    assert_eq!(s.log.level, "debug");
    assert_eq!(
        s.log.file,
        Some(std::path::PathBuf::from("/tmp/stemplay.log"))
    );
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[transport]
tick_hz = 30
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("STEMPLAY_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("STEMPLAY__TRANSPORT__TICK_HZ", "120");

    let s = Settings::load().unwrap();
    assert_eq!(s.transport.tick_hz, 120);
}
