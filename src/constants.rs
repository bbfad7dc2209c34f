//! Output Format Constants
//!
//! Fixed output format shared by assets, sessions and drivers.

/// Default output sample rate (44.1 kHz).
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Output channel count. Every stream is rendered as interleaved stereo.
pub const OUTPUT_CHANNELS: u16 = 2;

/// Bytes occupied by one rendered stereo frame of 16-bit PCM.
pub const BYTES_PER_FRAME: usize = std::mem::size_of::<i16>() * OUTPUT_CHANNELS as usize;

/// Stereo frames pulled from the engine per round of the render loop.
pub const SCRATCH_FRAMES: usize = 2048;

/// Scratch capacity in individual 16-bit samples.
pub const SCRATCH_SAMPLES: usize = SCRATCH_FRAMES * OUTPUT_CHANNELS as usize;

/// Scale mapping signed 16-bit PCM to `[-1.0, 1.0)`.
///
/// `i16::MIN` maps to exactly `-1.0`.
pub const I16_TO_F32: f32 = 1.0 / 32768.0;

/// Consecutive empty pulls tolerated within a single render call.
pub const MAX_STALLED_PULLS: u32 = 8;
