//! Folder enumeration for stem sessions.
//!
//! Turns a folder into the ordered list of candidate audio files handed to
//! the playback graph. Decoding happens later; this only filters by name.

mod scan;

pub use scan::scan_folder;
