//! The audio engine context: whatever is pulling samples from the mix bus.

use log::{info, warn};
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use crate::error::DeviceError;

use super::bus::MixSource;

/// An output device the mix bus can be connected to.
///
/// Created once per player and dropped when the control thread exits. Not
/// `Send`: rodio's stream must live on the thread that opened it.
pub trait AudioOutput {
    /// Start pulling from `source`, replacing any previous bus.
    fn connect(&mut self, source: MixSource) -> Result<(), DeviceError>;
    /// Stop pulling from the current bus, if any.
    fn disconnect(&mut self);
    /// Gain applied to the summed mix.
    fn set_master_gain(&mut self, gain: f32);
}

/// The default system output through rodio.
pub struct RodioOutput {
    stream: Option<OutputStream>,
    sink: Option<Sink>,
    master_gain: f32,
    open_error: Option<String>,
}

impl RodioOutput {
    /// Open the default device. A missing device is remembered, not fatal:
    /// every later `connect` reports it as `DeviceError::Unavailable`.
    pub fn open_default(master_gain: f32) -> Self {
        match OutputStreamBuilder::open_default_stream() {
            Ok(mut stream) => {
                // rodio logs to stderr when the stream is dropped, which would tear the TUI.
                stream.log_on_drop(false);
                info!("opened default audio output");
                Self {
                    stream: Some(stream),
                    sink: None,
                    master_gain,
                    open_error: None,
                }
            }
            Err(e) => {
                warn!("no audio output device: {e}");
                Self {
                    stream: None,
                    sink: None,
                    master_gain,
                    open_error: Some(e.to_string()),
                }
            }
        }
    }
}

impl AudioOutput for RodioOutput {
    fn connect(&mut self, source: MixSource) -> Result<(), DeviceError> {
        self.disconnect();
        let Some(stream) = self.stream.as_ref() else {
            let reason = self
                .open_error
                .clone()
                .unwrap_or_else(|| "device closed".to_string());
            return Err(DeviceError::Unavailable(reason));
        };
        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(self.master_gain);
        sink.append(source);
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain;
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(gain);
        }
    }
}

#[cfg(test)]
pub(crate) use manual::ManualOutput;

#[cfg(test)]
mod manual {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct ManualState {
        source: Option<MixSource>,
        master_gain: f32,
        unavailable: bool,
        connects: usize,
    }

    /// A sound card stand-in: tests pull frames whenever they like.
    #[derive(Clone, Default)]
    pub(crate) struct ManualOutput {
        state: Arc<Mutex<ManualState>>,
    }

    impl ManualOutput {
        pub(crate) fn new() -> Self {
            let out = Self::default();
            out.state.lock().unwrap().master_gain = 1.0;
            out
        }

        pub(crate) fn unavailable() -> Self {
            let out = Self::new();
            out.state.lock().unwrap().unavailable = true;
            out
        }

        /// Render `n` stereo frames with the master gain applied. Silence when disconnected.
        pub(crate) fn pull(&self, n: usize) -> Vec<(f32, f32)> {
            let mut state = self.state.lock().unwrap();
            let gain = state.master_gain;
            match state.source.as_mut() {
                Some(src) => (0..n)
                    .map(|_| {
                        let l = src.next().unwrap_or(0.0);
                        let r = src.next().unwrap_or(0.0);
                        (l * gain, r * gain)
                    })
                    .collect(),
                None => vec![(0.0, 0.0); n],
            }
        }

        pub(crate) fn is_connected(&self) -> bool {
            self.state.lock().unwrap().source.is_some()
        }

        pub(crate) fn connects(&self) -> usize {
            self.state.lock().unwrap().connects
        }

        pub(crate) fn master_gain(&self) -> f32 {
            self.state.lock().unwrap().master_gain
        }
    }

    impl AudioOutput for ManualOutput {
        fn connect(&mut self, source: MixSource) -> Result<(), DeviceError> {
            let mut state = self.state.lock().unwrap();
            if state.unavailable {
                return Err(DeviceError::Unavailable("manual output disabled".to_string()));
            }
            state.source = Some(source);
            state.connects += 1;
            Ok(())
        }

        fn disconnect(&mut self) {
            self.state.lock().unwrap().source = None;
        }

        fn set_master_gain(&mut self, gain: f32) {
            self.state.lock().unwrap().master_gain = gain;
        }
    }
}
