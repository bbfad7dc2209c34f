//! Stereo audio frame
//!
//! The floating-point frame format handed to output devices.

use crate::constants::I16_TO_F32;

/// One stereo sample instant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioFrame {
    /// Left channel amplitude
    pub left: f32,
    /// Right channel amplitude
    pub right: f32,
}

impl AudioFrame {
    /// Zero amplitude on both channels
    pub const SILENCE: AudioFrame = AudioFrame {
        left: 0.0,
        right: 0.0,
    };

    /// Create a frame from explicit channel amplitudes
    pub const fn new(left: f32, right: f32) -> Self {
        AudioFrame { left, right }
    }

    /// Convert a left/right pair of signed 16-bit PCM samples
    #[inline]
    pub fn from_i16(left: i16, right: i16) -> Self {
        AudioFrame {
            left: left as f32 * I16_TO_F32,
            right: right as f32 * I16_TO_F32,
        }
    }

    /// Convert back to signed 16-bit PCM, clamping out-of-range amplitudes
    ///
    /// Exact inverse of [`AudioFrame::from_i16`] for frames produced by it.
    #[inline]
    pub fn to_i16(self) -> (i16, i16) {
        (f32_to_i16(self.left), f32_to_i16(self.right))
    }
}

#[inline]
fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
