//! The stem engine.
//!
//! Layout, bottom-up:
//! - `stem`: decoded, immutable sample buffers
//! - `bus`: the real-time mix bus every track is routed through
//! - `output`: the device the bus is connected to
//! - `resolve`, `graph`, `transport`: gain resolution, the playback graph and
//!   the play/stop/scrub state machine on top of it
//! - `thread`, `player`: the control thread owning all of the above and its
//!   front handle

mod bus;
mod coalesce;
mod graph;
mod output;
mod player;
mod resolve;
mod stem;
mod thread;
mod track;
mod transport;
mod types;

pub use player::StemPlayer;
pub(crate) use stem::open_decoder;
pub use track::{TrackId, TrackInfo, WaveformSlot};
pub use transport::TransportState;
pub use types::{ControlCmd, TransportStatus};
