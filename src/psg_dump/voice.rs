//! PSG voices
//!
//! Three square-wave tone voices and one LFSR noise source, driven once per
//! output sample from the current register frame.

use bitflags::bitflags;

/// Number of tone channels
pub const NUM_CHANNELS: usize = 3;

/// Logarithmic 4-bit amplitude table (hardware measurements)
pub const VOLUME_TABLE: [u16; 16] = [
    20, 53, 88, 125, 193, 258, 385, 525, 753, 1029, 1523, 2077, 3110, 4395, 7073, 10922,
];

const VOLUME_SCALE: f32 = 1.0 / 32767.0;

/// Amplitude register bit selecting envelope mode
const ENVELOPE_MODE: u8 = 0x10;

bitflags! {
    /// Mixer Control Register (R7) bitflags; a set bit disables the source
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MixerFlags: u8 {
        /// Channel A tone disable
        const CH_A_TONE = 0x01;
        /// Channel B tone disable
        const CH_B_TONE = 0x02;
        /// Channel C tone disable
        const CH_C_TONE = 0x04;
        /// Channel A noise disable
        const CH_A_NOISE = 0x08;
        /// Channel B noise disable
        const CH_B_NOISE = 0x10;
        /// Channel C noise disable
        const CH_C_NOISE = 0x20;
    }
}

impl MixerFlags {
    /// Create mixer flags from raw register value
    pub fn from_register(value: u8) -> Self {
        MixerFlags::from_bits_truncate(value)
    }

    /// Check if the tone source of `channel` (0-2) is enabled
    pub fn tone_enabled(&self, channel: usize) -> bool {
        !self.contains(MixerFlags::from_bits_truncate(0x01 << channel))
    }

    /// Check if the noise source of `channel` (0-2) is enabled
    pub fn noise_enabled(&self, channel: usize) -> bool {
        !self.contains(MixerFlags::from_bits_truncate(0x08 << channel))
    }
}

/// Output level for an amplitude register value
///
/// Envelope mode has no envelope generator here and plays at full level.
#[inline]
pub fn amplitude_level(amplitude: u8) -> f32 {
    let index = if amplitude & ENVELOPE_MODE != 0 {
        15
    } else {
        amplitude & 0x0F
    };
    VOLUME_TABLE[index as usize] as f32 * VOLUME_SCALE
}

/// Frequency of a tone or noise period for the given master clock
#[inline]
fn period_frequency(master_clock: u32, period: u16) -> f32 {
    if period == 0 {
        0.0
    } else {
        master_clock as f32 / (16.0 * period as f32)
    }
}

/// Square wave oscillator at the output sample rate
#[derive(Debug, Clone, Copy, Default)]
struct ToneVoice {
    phase: f32,
    increment: f32,
}

impl ToneVoice {
    fn set_frequency(&mut self, frequency: f32, sample_rate: u32) {
        // Above Nyquist the square degenerates; hold it high instead
        self.increment = if frequency <= 0.0 || frequency >= sample_rate as f32 / 2.0 {
            0.0
        } else {
            frequency / sample_rate as f32
        };
    }

    #[inline]
    fn next(&mut self) -> bool {
        if self.increment == 0.0 {
            return true;
        }
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.phase < 0.5
    }
}

/// 17-bit Galois LFSR clocked at the noise frequency
#[derive(Debug, Clone, Copy)]
struct NoiseVoice {
    phase: f32,
    increment: f32,
    lfsr: u32,
    high: bool,
}

impl NoiseVoice {
    fn new() -> Self {
        NoiseVoice {
            phase: 0.0,
            increment: 0.0,
            lfsr: 1, // Must be non-zero
            high: false,
        }
    }

    fn set_frequency(&mut self, frequency: f32, sample_rate: u32) {
        self.increment = (frequency / sample_rate as f32).max(0.0);
    }

    #[inline]
    fn next(&mut self) -> bool {
        self.phase += self.increment;
        while self.phase >= 1.0 {
            self.phase -= 1.0;
            let lsb = self.lfsr & 1;
            self.lfsr >>= 1;
            if lsb != 0 {
                self.lfsr ^= 0x12000; // Taps at bits 13 and 16
            }
            self.high = lsb != 0;
        }
        self.high
    }
}

/// Register-driven voice bank
#[derive(Debug, Clone)]
pub struct PsgVoices {
    tones: [ToneVoice; NUM_CHANNELS],
    noise: NoiseVoice,
    mixer: MixerFlags,
    levels: [f32; NUM_CHANNELS],
}

impl PsgVoices {
    /// Silent voice bank
    pub fn new() -> Self {
        PsgVoices {
            tones: [ToneVoice::default(); NUM_CHANNELS],
            noise: NoiseVoice::new(),
            mixer: MixerFlags::all(),
            levels: [0.0; NUM_CHANNELS],
        }
    }

    /// Reset oscillators and silence all channels
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Apply one frame of registers R0-R15
    ///
    /// Oscillator phases carry over so consecutive frames join without clicks.
    pub fn load_registers(&mut self, regs: &[u8; 16], master_clock: u32, sample_rate: u32) {
        for (channel, tone) in self.tones.iter_mut().enumerate() {
            let period = (((regs[channel * 2 + 1] as u16) & 0x0F) << 8) | regs[channel * 2] as u16;
            tone.set_frequency(period_frequency(master_clock, period), sample_rate);
            self.levels[channel] = amplitude_level(regs[8 + channel]);
        }
        // Noise period 0 behaves as 1
        let noise_period = ((regs[6] & 0x1F) as u16).max(1);
        self.noise
            .set_frequency(period_frequency(master_clock, noise_period), sample_rate);
        self.mixer = MixerFlags::from_register(regs[7]);
    }

    /// Advance one output sample and return the (left, right) mix
    ///
    /// Channel A is panned left, C right, and B sits in the centre.
    #[inline]
    pub fn next_frame(&mut self) -> (f32, f32) {
        let noise = self.noise.next();
        let mut out = [0.0f32; NUM_CHANNELS];
        for (channel, value) in out.iter_mut().enumerate() {
            let tone_on = self.mixer.tone_enabled(channel);
            let noise_on = self.mixer.noise_enabled(channel);
            let tone = self.tones[channel].next();
            if !tone_on && !noise_on {
                continue;
            }
            let gate = (!tone_on || tone) && (!noise_on || noise);
            let level = self.levels[channel];
            *value = if gate { level } else { -level };
        }
        let centre = out[1] * 0.5;
        (out[0] + centre, out[2] + centre)
    }
}

impl Default for PsgVoices {
    fn default() -> Self {
        Self::new()
    }
}
