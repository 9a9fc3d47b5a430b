use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use crate::config::{self, LogSettings};

/// Route the `log` facade to a file so it never draws over the TUI.
///
/// `RUST_LOG` wins over `log.level`. Returns the file in use.
pub fn init_logging(settings: &LogSettings) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = settings
        .file
        .clone()
        .or_else(config::default_log_path)
        .ok_or("no log file location (set log.file or HOME)")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.level))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()?;
    Ok(path)
}
