//! PSG dump writer

use super::parser::{FORMAT_VERSION, MAGIC, REGISTERS_PER_FRAME};

/// Default PSG master clock (Atari ST, 2 MHz)
pub const DEFAULT_MASTER_CLOCK: u32 = 2_000_000;

/// Default frame rate (PAL vertical blank)
pub const DEFAULT_FRAME_RATE: u16 = 50;

/// Assembles PSG dump bytes from register frames
///
/// # Example
/// ```
/// use modstream::PsgDumpBuilder;
///
/// let bytes = PsgDumpBuilder::new()
///     .tempo(125.0)
///     .push_frame(PsgDumpBuilder::tone_frame([284, 0, 0], [15, 0, 0]))
///     .build();
/// assert_eq!(&bytes[..4], b"PSGD");
/// ```
#[derive(Debug, Clone)]
pub struct PsgDumpBuilder {
    frame_rate: u16,
    master_clock: u32,
    loop_frame: u32,
    tempo_bpm: f32,
    beats_per_bar: u8,
    beat_count: Option<u32>,
    frames: Vec<[u8; REGISTERS_PER_FRAME]>,
}

impl PsgDumpBuilder {
    /// Empty 50 Hz dump at 2 MHz, 120 bpm in 4/4
    pub fn new() -> Self {
        PsgDumpBuilder {
            frame_rate: DEFAULT_FRAME_RATE,
            master_clock: DEFAULT_MASTER_CLOCK,
            loop_frame: 0,
            tempo_bpm: 120.0,
            beats_per_bar: 4,
            beat_count: None,
            frames: Vec::new(),
        }
    }

    /// Register frames per second
    pub fn frame_rate(mut self, frame_rate: u16) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// PSG master clock in Hz
    pub fn master_clock(mut self, master_clock: u32) -> Self {
        self.master_clock = master_clock;
        self
    }

    /// Frame playback wraps to
    pub fn loop_frame(mut self, frame: u32) -> Self {
        self.loop_frame = frame;
        self
    }

    /// Tempo in beats per minute
    pub fn tempo(mut self, bpm: f32) -> Self {
        self.tempo_bpm = bpm;
        self
    }

    /// Beats per bar
    pub fn beats_per_bar(mut self, beats: u8) -> Self {
        self.beats_per_bar = beats;
        self
    }

    /// Override the beat count derived from tempo and duration
    pub fn beat_count(mut self, beats: u32) -> Self {
        self.beat_count = Some(beats);
        self
    }

    /// Append one frame of registers R0-R15
    pub fn push_frame(mut self, regs: [u8; REGISTERS_PER_FRAME]) -> Self {
        self.frames.push(regs);
        self
    }

    /// Append several frames
    pub fn push_frames<I>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = [u8; REGISTERS_PER_FRAME]>,
    {
        self.frames.extend(frames);
        self
    }

    /// Register frame playing pure tones
    ///
    /// Noise is disabled on every channel; tone is enabled on channels with a
    /// non-zero volume.
    pub fn tone_frame(periods: [u16; 3], volumes: [u8; 3]) -> [u8; REGISTERS_PER_FRAME] {
        let mut regs = [0u8; REGISTERS_PER_FRAME];
        let mut mixer = 0x3Fu8;
        for channel in 0..3 {
            let period = periods[channel] & 0x0FFF;
            regs[channel * 2] = (period & 0xFF) as u8;
            regs[channel * 2 + 1] = (period >> 8) as u8;
            regs[8 + channel] = volumes[channel] & 0x0F;
            if volumes[channel] > 0 {
                mixer &= !(1 << channel);
            }
        }
        regs[7] = mixer;
        regs
    }

    /// Encode the dump
    pub fn build(&self) -> Vec<u8> {
        let frame_count = self.frames.len() as u32;
        let beat_count = self.beat_count.unwrap_or_else(|| {
            if self.frame_rate == 0 {
                return 0;
            }
            let seconds = frame_count as f64 / self.frame_rate as f64;
            (seconds * self.tempo_bpm as f64 / 60.0).round() as u32
        });

        let mut out = Vec::with_capacity(30 + self.frames.len() * REGISTERS_PER_FRAME);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
        out.extend_from_slice(&self.frame_rate.to_be_bytes());
        out.extend_from_slice(&self.master_clock.to_be_bytes());
        out.extend_from_slice(&frame_count.to_be_bytes());
        out.extend_from_slice(&self.loop_frame.to_be_bytes());
        out.extend_from_slice(&self.tempo_bpm.to_be_bytes());
        out.push(self.beats_per_bar);
        out.push(0); // reserved
        out.extend_from_slice(&beat_count.to_be_bytes());
        for frame in &self.frames {
            out.extend_from_slice(frame);
        }
        out
    }
}

impl Default for PsgDumpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psg_dump::parser::{parse_module, HEADER_LEN};

    #[test]
    fn test_tone_frame_registers() {
        let regs = PsgDumpBuilder::tone_frame([0x123, 0, 0x0FF], [15, 0, 0x1F]);
        assert_eq!(regs[0], 0x23);
        assert_eq!(regs[1], 0x01);
        assert_eq!(regs[4], 0xFF);
        assert_eq!(regs[5], 0x00);
        // Tone A and C enabled, all noise disabled
        assert_eq!(regs[7], 0b0011_1010);
        assert_eq!(regs[8], 15);
        assert_eq!(regs[9], 0);
        assert_eq!(regs[10], 15);
    }

    #[test]
    fn test_derived_beat_count() {
        // 100 frames at 50 Hz = 2 s; 120 bpm -> 4 beats
        let data = PsgDumpBuilder::new()
            .push_frames(std::iter::repeat([0u8; 16]).take(100))
            .build();
        let module = parse_module(&data).unwrap();
        assert_eq!(module.header.beat_count, 4);
    }

    #[test]
    fn test_header_size() {
        let data = PsgDumpBuilder::new().build();
        assert_eq!(data.len(), HEADER_LEN);
    }
}
