use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::error::LoadError;

fn normalized_extensions(settings: &LibrarySettings) -> Vec<String> {
    settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn has_extension(path: &Path, exts: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn sort_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Enumerate the candidate stem files in `dir`.
///
/// Only the folder itself is listed unless `settings.recursive` is set. The
/// result is ordered by file name, case-insensitively, which becomes the track
/// order of the session.
pub fn scan_folder(dir: &Path, settings: &LibrarySettings) -> Result<Vec<PathBuf>, LoadError> {
    let meta = fs::metadata(dir).map_err(|source| LoadError::Unreadable {
        path: dir.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(LoadError::NotADirectory(dir.to_path_buf()));
    }
    // Surface permission problems on the root instead of returning an empty list.
    fs::read_dir(dir).map_err(|source| LoadError::Unreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let exts = normalized_extensions(settings);
    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    let mut paths: Vec<PathBuf> = walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file() && has_extension(e.path(), &exts))
        .map(|e| e.into_path())
        .collect();

    paths.sort_by_key(|p| sort_key(p));
    debug!("scanned {}: {} candidate stems", dir.display(), paths.len());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_extension_is_case_insensitive() {
        let exts = normalized_extensions(&LibrarySettings::default());
        assert!(has_extension(Path::new("/tmp/drums.wav"), &exts));
        assert!(has_extension(Path::new("/tmp/bass.AIFF"), &exts));
        assert!(has_extension(Path::new("/tmp/vox.M4a"), &exts));
        assert!(!has_extension(Path::new("/tmp/notes.txt"), &exts));
        assert!(!has_extension(Path::new("/tmp/drums"), &exts));
    }

    #[test]
    fn configured_extensions_tolerate_dots_and_blanks() {
        let settings = LibrarySettings {
            extensions: vec![".FLAC".into(), "  ".into()],
            ..LibrarySettings::default()
        };
        assert_eq!(normalized_extensions(&settings), vec!["flac".to_string()]);
    }
}
