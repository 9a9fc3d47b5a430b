//! Application module: exposes the app model used by the TUI and runtime.
//!
//! The `App` model lives in `app::model` and holds the latest engine
//! snapshots plus the stem selection.

mod model;

pub use model::*;
