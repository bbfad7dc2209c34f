//! Synthesis engine abstraction
//!
//! This module defines the interface a module decoder/synthesizer must
//! implement to be driven by a [`PlaybackSession`](crate::PlaybackSession).
//! The playback core never looks inside an engine: it initializes one, hands
//! it the module bytes, prepares a render pass and then pulls interleaved
//! 16-bit stereo PCM from it until it reports the end of the stream.

use bitflags::bitflags;

use crate::constants::BYTES_PER_FRAME;
use crate::Result;

#[cfg(test)]
pub(crate) mod scripted;

bitflags! {
    /// Render pass options passed to [`SynthEngine::prepare_render`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RenderFlags: u8 {
        /// Wrap to the loop point instead of ending the stream
        const LOOP = 0x01;
    }
}

/// Parameters for a fresh render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPreparation {
    /// Render pass options
    pub flags: RenderFlags,
    /// Linear output gain (1.0 = unity)
    pub master_volume: f32,
    /// Position the pass starts from, in seconds
    pub start_offset_seconds: f64,
    /// Loop restart position in seconds; engines fall back to their own loop
    /// point when this is zero or outside the sequence
    pub loop_offset_seconds: f64,
}

impl RenderPreparation {
    /// Unity-gain pass from the beginning of the sequence
    pub fn new(loop_enabled: bool) -> Self {
        RenderPreparation {
            flags: if loop_enabled {
                RenderFlags::LOOP
            } else {
                RenderFlags::empty()
            },
            master_volume: 1.0,
            start_offset_seconds: 0.0,
            loop_offset_seconds: 0.0,
        }
    }

    /// Set the loop restart position
    pub fn with_loop_offset(mut self, seconds: f64) -> Self {
        self.loop_offset_seconds = seconds;
        self
    }

    /// Whether the pass wraps at the end of the sequence
    pub fn loop_enabled(&self) -> bool {
        self.flags.contains(RenderFlags::LOOP)
    }
}

impl Default for RenderPreparation {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Outcome of a single [`SynthEngine::pull_samples`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PullResult {
    /// `false` when the engine failed and cannot continue this pass
    pub keep_going: bool,
    /// Bytes of 16-bit PCM written to the output slice
    pub filled_bytes: usize,
    /// The engine has no more samples to offer in this pass
    pub end_of_stream: bool,
    /// Times the sequence wrapped to its loop point during this pull
    pub wraps: u32,
}

impl PullResult {
    /// Successful pull that wrote `frames` stereo frames
    pub fn filled(frames: usize) -> Self {
        PullResult {
            keep_going: true,
            filled_bytes: frames * BYTES_PER_FRAME,
            end_of_stream: false,
            wraps: 0,
        }
    }

    /// Successful pull that wrote `frames` frames and reached the end
    pub fn finished(frames: usize) -> Self {
        PullResult {
            end_of_stream: true,
            ..Self::filled(frames)
        }
    }

    /// Engine failure; nothing written
    pub fn failed() -> Self {
        PullResult {
            keep_going: false,
            filled_bytes: 0,
            end_of_stream: false,
            wraps: 0,
        }
    }

    /// Record `wraps` loop wraps on this result
    pub fn with_wraps(mut self, wraps: u32) -> Self {
        self.wraps = wraps;
        self
    }

    /// Whole stereo frames covered by `filled_bytes`
    pub fn frames_filled(&self) -> usize {
        self.filled_bytes / BYTES_PER_FRAME
    }

    /// Whether the render loop must terminate after consuming this result
    pub fn is_terminal(&self) -> bool {
        !self.keep_going || self.end_of_stream
    }
}

/// Common interface for chiptune synthesis engines
///
/// One engine instance renders one stream. Instances are never shared
/// between sessions; every session initializes and loads its own.
///
/// Call order: [`init`](SynthEngine::init) →
/// [`configure_output`](SynthEngine::configure_output) →
/// [`load`](SynthEngine::load) →
/// [`prepare_render`](SynthEngine::prepare_render) → repeated
/// [`pull_samples`](SynthEngine::pull_samples). `prepare_render` may be called
/// again at any time to begin a new pass.
pub trait SynthEngine: Send {
    /// Create an engine instance ready to be configured
    fn init() -> Result<Self>
    where
        Self: Sized;

    /// Short human readable engine name
    fn name(&self) -> &str;

    /// Negotiate the output format
    ///
    /// # Arguments
    /// * `channels` - Interleaved channel count (the playback core uses 2)
    /// * `sample_rate` - Output sample rate in Hz
    fn configure_output(&mut self, channels: u16, sample_rate: u32) -> Result<()>;

    /// Decode module bytes
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Reset the render state and begin a new pass
    fn prepare_render(&mut self, prep: &RenderPreparation) -> Result<()>;

    /// Render up to `out.len()` interleaved stereo samples
    ///
    /// May fill fewer samples than requested, including none, without that
    /// being an error. Must never write more than `out.len()` samples. Every
    /// wrap to the loop point inside the call is reported in
    /// [`PullResult::wraps`].
    fn pull_samples(&mut self, out: &mut [i16]) -> PullResult;

    /// Length of one pass through the sequence, in frames
    fn total_sample_count(&self) -> u64;

    /// Frames rendered since the start of the sequence
    fn sample_cursor(&self) -> u64;

    /// Move the render position without re-rendering
    fn set_sample_cursor(&mut self, value: u64);

    /// Tempo in beats per minute
    fn tempo(&self) -> f64;

    /// Beats per bar
    fn beats_per_bar(&self) -> u32;

    /// Total beats in the sequence
    fn beat_count(&self) -> u32;
}
