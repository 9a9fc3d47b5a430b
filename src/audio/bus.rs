//! Real-time mix bus.
//!
//! The control thread owns a [`MixHandle`]; the audio output pulls samples
//! from the matching [`MixSource`]. Everything crossing between the two goes
//! through wait-free `rtrb` rings or atomics:
//!
//! - commands (attach, detach, schedule, start, stop) flow control → audio and
//!   are applied at frame boundaries, so a `Start` hits every node on the
//!   same output frame
//! - detached voices flow audio → control, so stem buffers are released on
//!   the control thread
//! - per-node gains are `f32` bits in an `AtomicU32`, written by the control
//!   thread and read by the audio thread every frame
//! - the frame clock and play progress are published back as atomics
//!
//! Voice storage is reserved up front; rendering never allocates or locks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rodio::Source;
use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::error::DeviceError;

use super::stem::StemAudio;

/// Upper bound on simultaneously attached stems.
pub const MAX_VOICES: usize = 64;
/// The bus always renders interleaved stereo.
pub const OUTPUT_CHANNELS: u16 = 2;

const COMMAND_CAPACITY: usize = 4 * MAX_VOICES;
/// Voices waiting to go back to the control side, in the ring or held by the source.
const RETIRE_CAPACITY: usize = 2 * MAX_VOICES;

/// Identifies one gain node on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

fn store_gain(cell: &AtomicU32, gain: f32) {
    cell.store(gain.to_bits(), Ordering::Relaxed);
}

fn load_gain(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

/// One stem routed through its gain node.
pub struct Voice {
    id: NodeId,
    audio: Arc<StemAudio>,
    gain: Arc<AtomicU32>,
    /// Next frame to render; `None` while unscheduled or finished.
    cursor: Option<u64>,
}

impl Voice {
    #[inline]
    fn next_frame(&mut self) -> Option<(f32, f32)> {
        let frame = self.cursor?;
        if frame >= self.audio.frames() {
            self.cursor = None;
            return None;
        }
        self.cursor = Some(frame + 1);
        Some(self.audio.stereo_frame(frame))
    }
}

enum BusCommand {
    Attach(Voice),
    Detach(NodeId),
    Schedule { node: NodeId, from: Option<u64> },
    Start { at: u64, generation: u64 },
    Stop { generation: u64 },
}

/// State published by the audio side.
#[derive(Default)]
struct BusShared {
    /// Frames rendered since the bus was created, running or not.
    clock: AtomicU64,
    /// Frames played since the last applied `Start`.
    progress: AtomicU64,
    /// Generation of the last applied `Start`/`Stop`.
    applied_generation: AtomicU64,
}

struct NodeEntry {
    id: NodeId,
    gain: Arc<AtomicU32>,
    frames: u64,
}

/// Control-side half of the bus.
pub struct MixHandle {
    commands: Producer<BusCommand>,
    retired: Consumer<Voice>,
    shared: Arc<BusShared>,
    nodes: Vec<NodeEntry>,
    sample_rate: u32,
    next_node: u64,
    /// Frame offset the current start (or stop) was scheduled from.
    anchor: u64,
    generation: u64,
    live: bool,
}

/// Audio-side half of the bus, handed to the output device.
pub struct MixSource {
    commands: Consumer<BusCommand>,
    retired: Producer<Voice>,
    shared: Arc<BusShared>,
    voices: Vec<Voice>,
    /// Voices the return ring had no room for; retried before each frame.
    retiring: Vec<Voice>,
    sample_rate: u32,
    running: bool,
    start_at: u64,
    clock: u64,
    progress: u64,
    frame: [f32; OUTPUT_CHANNELS as usize],
    channel: usize,
}

/// Create a bus running at `sample_rate`.
pub fn mix_bus(sample_rate: u32) -> (MixHandle, MixSource) {
    let (cmd_tx, cmd_rx) = RingBuffer::new(COMMAND_CAPACITY);
    let (ret_tx, ret_rx) = RingBuffer::new(RETIRE_CAPACITY);
    let shared = Arc::new(BusShared::default());

    let handle = MixHandle {
        commands: cmd_tx,
        retired: ret_rx,
        shared: shared.clone(),
        nodes: Vec::with_capacity(MAX_VOICES),
        sample_rate,
        next_node: 0,
        anchor: 0,
        generation: 0,
        live: false,
    };
    let source = MixSource {
        commands: cmd_rx,
        retired: ret_tx,
        shared,
        voices: Vec::with_capacity(MAX_VOICES),
        retiring: Vec::with_capacity(RETIRE_CAPACITY),
        sample_rate,
        running: false,
        start_at: 0,
        clock: 0,
        progress: 0,
        frame: [0.0; OUTPUT_CHANNELS as usize],
        channel: 0,
    };
    (handle, source)
}

impl MixHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether a device is pulling the source.
    ///
    /// While not live, commands are not queued (nothing would drain them);
    /// only the control-side bookkeeping is updated.
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn set_live(&mut self, live: bool) {
        self.live = live;
    }

    fn send(&mut self, cmd: BusCommand) -> Result<(), DeviceError> {
        if !self.live {
            return Ok(());
        }
        self.commands
            .push(cmd)
            .map_err(|_| DeviceError::QueueFull)
    }

    /// Route `audio` through a new gain node. The node stays silent until scheduled.
    pub fn attach(&mut self, audio: Arc<StemAudio>, gain: f32) -> Result<NodeId, DeviceError> {
        if self.nodes.len() >= MAX_VOICES {
            return Err(DeviceError::NodeLimit(MAX_VOICES));
        }
        let id = NodeId(self.next_node);
        let cell = Arc::new(AtomicU32::new(gain.to_bits()));
        let frames = audio.frames();
        self.send(BusCommand::Attach(Voice {
            id,
            audio,
            gain: cell.clone(),
            cursor: None,
        }))?;
        self.next_node += 1;
        self.nodes.push(NodeEntry {
            id,
            gain: cell,
            frames,
        });
        Ok(id)
    }

    pub fn detach(&mut self, id: NodeId) -> Result<(), DeviceError> {
        let Some(pos) = self.nodes.iter().position(|n| n.id == id) else {
            return Ok(());
        };
        self.send(BusCommand::Detach(id))?;
        self.nodes.remove(pos);
        Ok(())
    }

    pub fn set_gain(&self, id: NodeId, gain: f32) {
        if let Some(node) = self.nodes.iter().find(|n| n.id == id) {
            store_gain(&node.gain, gain);
        }
    }

    #[cfg(test)]
    pub fn gain(&self, id: NodeId) -> Option<f32> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| load_gain(&n.gain))
    }

    /// Point one node at `frame`. A frame at or past the node's end leaves it silent.
    pub fn schedule_from(&mut self, id: NodeId, frame: u64) -> Result<(), DeviceError> {
        let Some(node) = self.nodes.iter().find(|n| n.id == id) else {
            return Ok(());
        };
        let from = (frame < node.frames).then_some(frame);
        self.send(BusCommand::Schedule { node: id, from })
    }

    /// Halt every node on the next rendered frame.
    pub fn stop(&mut self) -> Result<(), DeviceError> {
        self.generation += 1;
        self.send(BusCommand::Stop {
            generation: self.generation,
        })
    }

    /// Stop, then schedule every node from `frame`.
    pub fn seek(&mut self, frame: u64) -> Result<(), DeviceError> {
        self.stop()?;
        self.anchor = frame;
        let ids: Vec<NodeId> = self.nodes.iter().map(|n| n.id).collect();
        for id in ids {
            self.schedule_from(id, frame)?;
        }
        Ok(())
    }

    /// Start every scheduled node at one shared clock frame, `lead` from now.
    pub fn start(&mut self, lead: Duration) -> Result<(), DeviceError> {
        if !self.live {
            return Err(DeviceError::Unavailable("no output connected".to_string()));
        }
        let lead_frames = (lead.as_secs_f64() * self.sample_rate as f64).round() as u64;
        let at = self.shared.clock.load(Ordering::Acquire) + lead_frames;
        self.generation += 1;
        self.send(BusCommand::Start {
            at,
            generation: self.generation,
        })
    }

    /// Frames rendered by the device so far, running or not.
    pub fn clock(&self) -> u64 {
        self.shared.clock.load(Ordering::Acquire)
    }

    /// Transport position in frames as heard from the bus.
    ///
    /// Until the audio side has applied the latest start, this is the frame
    /// that start was scheduled from.
    pub fn elapsed(&self) -> u64 {
        let applied = self.shared.applied_generation.load(Ordering::Acquire);
        if applied == self.generation {
            self.anchor + self.shared.progress.load(Ordering::Acquire)
        } else {
            self.anchor
        }
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drop voices the audio side has handed back. Returns how many were reclaimed.
    pub fn reclaim(&mut self) -> usize {
        let mut n = 0;
        while let Ok(voice) = self.retired.pop() {
            drop(voice);
            n += 1;
        }
        n
    }

    /// Wait up to `timeout` for `expected` detached voices to come back.
    pub fn reclaim_within(&mut self, expected: usize, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut n = self.reclaim();
        while n < expected && self.live && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
            n += self.reclaim();
        }
        n
    }
}

impl MixSource {
    /// Hand `voice` back to the control side. A full ring parks it here; its
    /// buffer is never dropped on the audio thread.
    fn retire(&mut self, voice: Voice) {
        if let Err(PushError::Full(voice)) = self.retired.push(voice) {
            self.retiring.push(voice);
        }
    }

    fn flush_retiring(&mut self) {
        while let Some(voice) = self.retiring.pop() {
            if let Err(PushError::Full(voice)) = self.retired.push(voice) {
                self.retiring.push(voice);
                break;
            }
        }
    }

    fn drain_commands(&mut self) {
        if !self.retiring.is_empty() {
            self.flush_retiring();
        }
        while let Ok(cmd) = self.commands.pop() {
            match cmd {
                BusCommand::Attach(voice) => {
                    if self.voices.len() < self.voices.capacity() {
                        self.voices.push(voice);
                    } else {
                        self.retire(voice);
                    }
                }
                BusCommand::Detach(id) => {
                    if let Some(pos) = self.voices.iter().position(|v| v.id == id) {
                        let voice = self.voices.swap_remove(pos);
                        self.retire(voice);
                    }
                }
                BusCommand::Schedule { node, from } => {
                    if let Some(voice) = self.voices.iter_mut().find(|v| v.id == node) {
                        voice.cursor = from;
                    }
                }
                BusCommand::Start { at, generation } => {
                    self.running = true;
                    self.start_at = at;
                    self.progress = 0;
                    self.shared.progress.store(0, Ordering::Release);
                    self.shared
                        .applied_generation
                        .store(generation, Ordering::Release);
                }
                BusCommand::Stop { generation } => {
                    self.running = false;
                    self.progress = 0;
                    self.shared.progress.store(0, Ordering::Release);
                    self.shared
                        .applied_generation
                        .store(generation, Ordering::Release);
                }
            }
        }
    }

    fn render_frame(&mut self) {
        self.drain_commands();

        let (mut left, mut right) = (0.0f32, 0.0f32);
        if self.running && self.clock >= self.start_at {
            for voice in &mut self.voices {
                if let Some((l, r)) = voice.next_frame() {
                    let g = load_gain(&voice.gain);
                    left += l * g;
                    right += r * g;
                }
            }
            self.progress += 1;
            self.shared.progress.store(self.progress, Ordering::Release);
        }

        self.clock += 1;
        self.shared.clock.store(self.clock, Ordering::Release);
        self.frame = [left, right];
    }
}

impl Iterator for MixSource {
    type Item = f32;

    #[inline]
    fn next(&mut self) -> Option<f32> {
        if self.channel == 0 {
            self.render_frame();
        }
        let sample = self.frame[self.channel];
        self.channel = (self.channel + 1) % OUTPUT_CHANNELS as usize;
        Some(sample)
    }
}

impl Source for MixSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> rodio::ChannelCount {
        OUTPUT_CHANNELS
    }

    fn sample_rate(&self) -> rodio::SampleRate {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(frames: usize) -> Arc<StemAudio> {
        let samples = (0..frames).map(|i| i as f32 / 1000.0).collect();
        Arc::new(StemAudio::from_samples(samples, 1, 1000))
    }

    fn pull(source: &mut MixSource, frames: usize) -> Vec<(f32, f32)> {
        (0..frames)
            .map(|_| {
                let l = source.next().unwrap();
                let r = source.next().unwrap();
                (l, r)
            })
            .collect()
    }

    fn live_bus() -> (MixHandle, MixSource) {
        let (mut handle, source) = mix_bus(1000);
        handle.set_live(true);
        (handle, source)
    }

    #[test]
    fn nothing_plays_before_start() {
        let (mut handle, mut source) = live_bus();
        let id = handle.attach(ramp(10), 1.0).unwrap();
        handle.schedule_from(id, 0).unwrap();
        assert!(pull(&mut source, 4).iter().all(|&(l, r)| l == 0.0 && r == 0.0));
        assert_eq!(handle.clock(), 4);
        assert_eq!(handle.elapsed(), 0);
    }

    #[test]
    fn start_renders_from_scheduled_frame_with_gain() {
        let (mut handle, mut source) = live_bus();
        let id = handle.attach(ramp(10), 0.5).unwrap();
        handle.seek(3).unwrap();
        handle.start(Duration::ZERO).unwrap();

        let out = pull(&mut source, 2);
        assert_relative_eq!(out[0].0, 0.003 * 0.5);
        assert_relative_eq!(out[1].1, 0.004 * 0.5);
        assert_eq!(handle.elapsed(), 5);

        handle.set_gain(id, 0.0);
        assert!(pull(&mut source, 2).iter().all(|&(l, _)| l == 0.0));
    }

    #[test]
    fn every_node_starts_on_the_same_frame() {
        let (mut handle, mut source) = live_bus();
        handle.attach(ramp(100), 1.0).unwrap();
        handle.attach(ramp(100), 1.0).unwrap();
        handle.seek(40).unwrap();
        handle.start(Duration::from_millis(5)).unwrap();

        let out = pull(&mut source, 8);
        // Five frames of lead, then both ramps from frame 40 summed.
        assert!(out[..5].iter().all(|&(l, _)| l == 0.0));
        assert_relative_eq!(out[5].0, 2.0 * 0.040);
        assert_relative_eq!(out[7].0, 2.0 * 0.042);
    }

    #[test]
    fn schedule_past_end_leaves_node_silent() {
        let (mut handle, mut source) = live_bus();
        handle.attach(ramp(10), 1.0).unwrap();
        let long = handle.attach(ramp(20), 1.0).unwrap();
        handle.set_gain(long, 0.0);
        handle.seek(12).unwrap();
        handle.start(Duration::ZERO).unwrap();
        assert!(pull(&mut source, 4).iter().all(|&(l, _)| l == 0.0));
        assert_eq!(handle.elapsed(), 16);
    }

    #[test]
    fn stop_freezes_elapsed_at_anchor_immediately() {
        let (mut handle, mut source) = live_bus();
        handle.attach(ramp(100), 1.0).unwrap();
        handle.seek(10).unwrap();
        handle.start(Duration::ZERO).unwrap();
        pull(&mut source, 5);
        assert_eq!(handle.elapsed(), 15);

        handle.seek(50).unwrap();
        assert_eq!(handle.elapsed(), 50);
        pull(&mut source, 5);
        assert_eq!(handle.elapsed(), 50);
    }

    #[test]
    fn detached_voices_come_back_to_the_control_side() {
        let (mut handle, mut source) = live_bus();
        let a = handle.attach(ramp(10), 1.0).unwrap();
        handle.attach(ramp(10), 1.0).unwrap();
        pull(&mut source, 1);
        handle.detach(a).unwrap();
        pull(&mut source, 1);
        assert_eq!(handle.reclaim(), 1);
        assert_eq!(handle.node_count(), 1);
    }

    #[test]
    fn voices_wait_on_the_audio_side_while_the_return_ring_is_full() {
        let (mut handle, mut source) = live_bus();
        let audio = ramp(4);
        let rounds = RETIRE_CAPACITY / MAX_VOICES + 1;
        for _ in 0..rounds {
            let ids: Vec<NodeId> = (0..MAX_VOICES)
                .map(|_| handle.attach(audio.clone(), 1.0).unwrap())
                .collect();
            pull(&mut source, 1);
            for id in ids {
                handle.detach(id).unwrap();
            }
            pull(&mut source, 1);
        }
        let total = rounds * MAX_VOICES;
        assert_eq!(Arc::strong_count(&audio), total + 1);

        let mut reclaimed = handle.reclaim();
        assert_eq!(reclaimed, RETIRE_CAPACITY);
        pull(&mut source, 1);
        reclaimed += handle.reclaim();
        assert_eq!(reclaimed, total);
        assert_eq!(Arc::strong_count(&audio), 1);
    }

    #[test]
    fn not_live_start_is_unavailable_and_queues_nothing() {
        let (mut handle, _source) = mix_bus(1000);
        handle.attach(ramp(10), 1.0).unwrap();
        for _ in 0..COMMAND_CAPACITY * 2 {
            handle.seek(0).unwrap();
        }
        assert!(matches!(
            handle.start(Duration::ZERO),
            Err(DeviceError::Unavailable(_))
        ));
    }

    #[test]
    fn full_ring_reports_queue_full() {
        let (mut handle, _source) = live_bus();
        let mut result = Ok(());
        for _ in 0..=COMMAND_CAPACITY {
            result = handle.stop();
        }
        assert_eq!(result, Err(DeviceError::QueueFull));
    }

    #[test]
    fn attach_enforces_node_limit() {
        let (mut handle, _source) = mix_bus(1000);
        for _ in 0..MAX_VOICES {
            handle.attach(ramp(1), 1.0).unwrap();
        }
        assert_eq!(
            handle.attach(ramp(1), 1.0),
            Err(DeviceError::NodeLimit(MAX_VOICES))
        );
    }
}
