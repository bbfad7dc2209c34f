//! PSG register dump engine
//!
//! Reference [`SynthEngine`] that plays register dumps of a three-voice
//! programmable sound generator. Each dump frame holds R0-R15 for one tick;
//! the engine holds the registers for `sample_rate / frame_rate` output
//! frames and renders square-wave tones and LFSR noise from them.
//!
//! The envelope generator is not emulated: channels in envelope mode play at
//! full level.

mod builder;
mod parser;
mod voice;

pub use builder::{PsgDumpBuilder, DEFAULT_FRAME_RATE, DEFAULT_MASTER_CLOCK};
pub use parser::{parse_module, PsgDumpHeader, PsgModule, HEADER_LEN, MAGIC};
pub use voice::{MixerFlags, VOLUME_TABLE};

use tracing::trace;

use crate::constants::{DEFAULT_SAMPLE_RATE, OUTPUT_CHANNELS};
use crate::engine::{PullResult, RenderFlags, RenderPreparation, SynthEngine};
use crate::{Result, StreamError};
use voice::PsgVoices;

/// Register dump player
#[derive(Debug)]
pub struct PsgDumpEngine {
    sample_rate: u32,
    module: Option<PsgModule>,
    samples_per_frame: u64,
    cursor: u64,
    loop_start: u64,
    flags: RenderFlags,
    master_volume: f32,
    prepared: bool,
    finished: bool,
    /// Register frame currently loaded into the voices
    current_frame: Option<usize>,
    voices: PsgVoices,
}

impl PsgDumpEngine {
    /// Parsed module, once loaded
    pub fn module(&self) -> Option<&PsgModule> {
        self.module.as_ref()
    }

    /// Output frames each register frame is held for
    pub fn samples_per_frame(&self) -> u64 {
        self.samples_per_frame
    }

    fn update_frame_length(&mut self) -> Result<()> {
        if let Some(module) = &self.module {
            let spf = (self.sample_rate / module.header.frame_rate as u32) as u64;
            if spf == 0 {
                return Err(StreamError::Engine(format!(
                    "frame rate {} Hz exceeds output rate {} Hz",
                    module.header.frame_rate, self.sample_rate
                )));
            }
            self.samples_per_frame = spf;
        }
        Ok(())
    }

    fn loop_point(&self, prep: &RenderPreparation) -> u64 {
        let total = self.total_sample_count();
        let offset = prep.loop_offset_seconds;
        if offset.is_finite() && offset > 0.0 {
            let start = (offset * self.sample_rate as f64) as u64;
            if start < total {
                return start;
            }
        }
        self.module
            .as_ref()
            .map_or(0, |m| m.header.loop_frame as u64 * self.samples_per_frame)
    }

    #[inline]
    fn to_pcm(value: f32, gain: f32) -> i16 {
        (value * gain * 32767.0)
            .round()
            .clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }
}

impl Default for PsgDumpEngine {
    fn default() -> Self {
        PsgDumpEngine {
            sample_rate: DEFAULT_SAMPLE_RATE,
            module: None,
            samples_per_frame: 0,
            cursor: 0,
            loop_start: 0,
            flags: RenderFlags::LOOP,
            master_volume: 1.0,
            prepared: false,
            finished: false,
            current_frame: None,
            voices: PsgVoices::new(),
        }
    }
}

impl SynthEngine for PsgDumpEngine {
    fn init() -> Result<Self> {
        Ok(Self::default())
    }

    fn name(&self) -> &str {
        "psg-dump"
    }

    fn configure_output(&mut self, channels: u16, sample_rate: u32) -> Result<()> {
        if channels != OUTPUT_CHANNELS {
            return Err(StreamError::Engine(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        if sample_rate == 0 {
            return Err(StreamError::Engine("sample rate must be non-zero".into()));
        }
        self.sample_rate = sample_rate;
        self.update_frame_length()
    }

    fn load(&mut self, data: &[u8]) -> Result<()> {
        let module = parse_module(data)?;
        trace!(
            frames = module.header.frame_count,
            frame_rate = module.header.frame_rate,
            clock = module.header.master_clock,
            "parsed PSG dump"
        );
        self.module = Some(module);
        self.prepared = false;
        if let Err(e) = self.update_frame_length() {
            self.module = None;
            return Err(e);
        }
        Ok(())
    }

    fn prepare_render(&mut self, prep: &RenderPreparation) -> Result<()> {
        if self.module.is_none() {
            return Err(StreamError::Engine("no module loaded".into()));
        }
        self.flags = prep.flags;
        self.master_volume = if prep.master_volume.is_finite() {
            prep.master_volume.max(0.0)
        } else {
            1.0
        };
        self.loop_start = self.loop_point(prep);

        let start = prep.start_offset_seconds;
        self.cursor = if start.is_finite() && start > 0.0 {
            ((start * self.sample_rate as f64) as u64).min(self.total_sample_count())
        } else {
            0
        };
        self.voices.reset();
        self.current_frame = None;
        self.finished = false;
        self.prepared = true;
        Ok(())
    }

    fn pull_samples(&mut self, out: &mut [i16]) -> PullResult {
        let Some(module) = self.module.as_ref() else {
            return PullResult::failed();
        };
        if !self.prepared {
            return PullResult::failed();
        }

        let total = module.frames.len() as u64 * self.samples_per_frame;
        let looping = self.flags.contains(RenderFlags::LOOP);
        let clock = module.header.master_clock;
        let wanted = out.len() / OUTPUT_CHANNELS as usize;

        let mut frames = 0;
        let mut wraps = 0;
        while frames < wanted && !self.finished {
            if self.cursor >= total {
                if looping {
                    self.cursor = self.loop_start;
                    wraps += 1;
                } else {
                    self.finished = true;
                    break;
                }
            }

            let index = (self.cursor / self.samples_per_frame) as usize;
            if self.current_frame != Some(index) {
                self.voices
                    .load_registers(&module.frames[index], clock, self.sample_rate);
                self.current_frame = Some(index);
            }

            let (left, right) = self.voices.next_frame();
            out[frames * 2] = Self::to_pcm(left, self.master_volume);
            out[frames * 2 + 1] = Self::to_pcm(right, self.master_volume);
            self.cursor += 1;
            frames += 1;
        }

        // Report the end with the last samples rather than on an empty pull
        if !looping && self.cursor >= total {
            self.finished = true;
        }
        let pull = if self.finished {
            PullResult::finished(frames)
        } else {
            PullResult::filled(frames)
        };
        pull.with_wraps(wraps)
    }

    fn total_sample_count(&self) -> u64 {
        self.module
            .as_ref()
            .map_or(0, |m| m.frames.len() as u64 * self.samples_per_frame)
    }

    fn sample_cursor(&self) -> u64 {
        self.cursor
    }

    fn set_sample_cursor(&mut self, value: u64) {
        self.cursor = value.min(self.total_sample_count());
        self.current_frame = None;
        self.finished = false;
    }

    fn tempo(&self) -> f64 {
        self.module
            .as_ref()
            .map_or(0.0, |m| m.header.tempo_bpm as f64)
    }

    fn beats_per_bar(&self) -> u32 {
        self.module
            .as_ref()
            .map_or(0, |m| m.header.beats_per_bar as u32)
    }

    fn beat_count(&self) -> u32 {
        self.module.as_ref().map_or(0, |m| m.header.beat_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_dump(frames: usize) -> Vec<u8> {
        PsgDumpBuilder::new()
            .push_frames(
                std::iter::repeat(PsgDumpBuilder::tone_frame([284, 0, 142], [15, 0, 12]))
                    .take(frames),
            )
            .build()
    }

    fn loaded(frames: usize) -> PsgDumpEngine {
        let mut engine = PsgDumpEngine::init().unwrap();
        engine.configure_output(2, 44_100).unwrap();
        engine.load(&tone_dump(frames)).unwrap();
        engine
    }

    #[test]
    fn test_total_sample_count() {
        let engine = loaded(50);
        assert_eq!(engine.samples_per_frame(), 882);
        assert_eq!(engine.total_sample_count(), 44_100);
        assert_eq!(engine.tempo(), 120.0);
        assert_eq!(engine.beats_per_bar(), 4);
        assert_eq!(engine.beat_count(), 2);
    }

    #[test]
    fn test_reject_mono_and_zero_rate() {
        let mut engine = PsgDumpEngine::init().unwrap();
        assert!(engine.configure_output(1, 44_100).is_err());
        assert!(engine.configure_output(2, 0).is_err());
    }

    #[test]
    fn test_reject_frame_rate_above_output_rate() {
        let data = PsgDumpBuilder::new()
            .frame_rate(1000)
            .push_frame([0; 16])
            .build();
        let mut engine = PsgDumpEngine::init().unwrap();
        engine.configure_output(2, 800).unwrap();
        assert!(engine.load(&data).is_err());
        assert!(engine.module().is_none());
    }

    #[test]
    fn test_pull_without_prepare_fails() {
        let mut engine = loaded(1);
        let mut buf = [0i16; 64];
        assert!(!engine.pull_samples(&mut buf).keep_going);
    }

    #[test]
    fn test_non_looping_ends_eagerly() {
        let mut engine = loaded(1);
        engine.prepare_render(&RenderPreparation::new(false)).unwrap();
        let mut buf = vec![0i16; 882 * 2];
        let pull = engine.pull_samples(&mut buf);
        assert_eq!(pull.frames_filled(), 882);
        assert!(pull.end_of_stream);
        assert!(buf.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_looping_wraps_to_loop_frame() {
        let data = PsgDumpBuilder::new()
            .loop_frame(1)
            .push_frames(std::iter::repeat([0u8; 16]).take(2))
            .build();
        let mut engine = PsgDumpEngine::init().unwrap();
        engine.load(&data).unwrap();
        engine.prepare_render(&RenderPreparation::new(true)).unwrap();

        let mut buf = vec![0i16; 1000 * 2];
        let pull = engine.pull_samples(&mut buf);
        assert_eq!(pull.frames_filled(), 1000);
        assert!(!pull.end_of_stream);
        assert_eq!(pull.wraps, 0);
        let pull = engine.pull_samples(&mut buf);
        assert_eq!(pull.frames_filled(), 1000);
        assert_eq!(pull.wraps, 1);
        // 2000 frames rendered, total 1764, wrapped to 882
        assert_eq!(engine.sample_cursor(), 882 + (2000 - 1764));
    }

    #[test]
    fn test_loop_offset_overrides_loop_frame() {
        let mut engine = loaded(4);
        let prep = RenderPreparation::new(true).with_loop_offset(0.05);
        engine.prepare_render(&prep).unwrap();
        engine.set_sample_cursor(engine.total_sample_count() - 10);
        let mut buf = vec![0i16; 20 * 2];
        engine.pull_samples(&mut buf);
        assert_eq!(engine.sample_cursor(), 2205 + 10);
    }

    #[test]
    fn test_short_sequence_reports_every_wrap() {
        // 1764-frame sequence, several wraps per pull
        let mut engine = loaded(2);
        engine.prepare_render(&RenderPreparation::new(true)).unwrap();
        let mut buf = vec![0i16; 4096];
        let mut rendered = 0;
        let mut wraps = 0;
        while rendered < 17_641 {
            let want = (17_641 - rendered).min(2048);
            let pull = engine.pull_samples(&mut buf[..want * 2]);
            rendered += pull.frames_filled();
            wraps += pull.wraps;
        }
        assert_eq!(wraps, 10);
        assert_eq!(engine.sample_cursor(), 1);
    }

    #[test]
    fn test_loop_offset_near_end_reports_every_wrap() {
        // 63/64 s restarts 690 frames before the end of a 1 s sequence
        let mut engine = loaded(50);
        let prep = RenderPreparation::new(true).with_loop_offset(0.984_375);
        engine.prepare_render(&prep).unwrap();
        assert_eq!(engine.loop_start, 43_410);

        let mut buf = vec![0i16; 46_100 * 2];
        let pull = engine.pull_samples(&mut buf);
        assert_eq!(pull.frames_filled(), 46_100);
        // Wraps before frames 44_100, 44_790 and 45_480
        assert_eq!(pull.wraps, 3);
        assert!(!pull.end_of_stream);
    }

    #[test]
    fn test_master_volume_scales_output() {
        let mut full = loaded(1);
        full.prepare_render(&RenderPreparation::new(false)).unwrap();
        let mut half = loaded(1);
        let mut prep = RenderPreparation::new(false);
        prep.master_volume = 0.5;
        half.prepare_render(&prep).unwrap();

        let mut a = vec![0i16; 200];
        let mut b = vec![0i16; 200];
        full.pull_samples(&mut a);
        half.pull_samples(&mut b);
        let peak_a = a.iter().map(|s| s.unsigned_abs()).max().unwrap();
        let peak_b = b.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak_b < peak_a);
        assert!(peak_b > 0);
    }

    #[test]
    fn test_set_sample_cursor_clamps_and_resumes() {
        let mut engine = loaded(1);
        engine.prepare_render(&RenderPreparation::new(false)).unwrap();
        let mut buf = vec![0i16; 2000];
        assert!(engine.pull_samples(&mut buf).end_of_stream);

        engine.set_sample_cursor(u64::MAX);
        assert_eq!(engine.sample_cursor(), 882);
        engine.set_sample_cursor(800);
        let pull = engine.pull_samples(&mut buf);
        assert_eq!(pull.frames_filled(), 82);
        assert!(pull.end_of_stream);
    }

    #[test]
    fn test_start_offset() {
        let mut engine = loaded(2);
        let mut prep = RenderPreparation::new(false);
        prep.start_offset_seconds = 0.02;
        engine.prepare_render(&prep).unwrap();
        assert_eq!(engine.sample_cursor(), 882);
    }
}
