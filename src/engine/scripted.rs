//! Deterministic engine for unit tests.
//!
//! Module bytes are a JSON [`Script`]. Sample values encode the cursor so
//! tests can check ordering: left = `cursor % 30000`, right = `-left`.

use serde::{Deserialize, Serialize};

use super::{PullResult, RenderPreparation, SynthEngine};
use crate::{Result, StreamError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Script {
    pub total_frames: u64,
    /// Per-pull fill limit in frames (0 = unlimited)
    pub max_fill_frames: usize,
    /// Every pull succeeds but writes nothing
    pub stall: bool,
    /// Pull fails once the cursor reaches this frame
    pub fail_at_frame: Option<u64>,
    /// Keep counting past the end when looping instead of resetting
    pub monotonic: bool,
    /// Successful `prepare_render` calls allowed per engine instance
    pub prepare_limit: Option<u32>,
    pub tempo: f64,
    pub beats_per_bar: u32,
    pub beat_count: u32,
}

impl Script {
    pub fn frames(total_frames: u64) -> Self {
        Script {
            total_frames,
            max_fill_frames: 0,
            stall: false,
            fail_at_frame: None,
            monotonic: false,
            prepare_limit: None,
            tempo: 120.0,
            beats_per_bar: 4,
            beat_count: 8,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap()
    }
}

pub(crate) fn sample_at(cursor: u64) -> (i16, i16) {
    let left = (cursor % 30_000) as i16;
    (left, -left)
}

#[derive(Default)]
pub(crate) struct ScriptedEngine {
    script: Option<Script>,
    cursor: u64,
    loop_start: u64,
    looping: bool,
    prepared: bool,
    finished: bool,
    prepares: u32,
}

impl SynthEngine for ScriptedEngine {
    fn init() -> Result<Self> {
        Ok(Self::default())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn configure_output(&mut self, _channels: u16, _sample_rate: u32) -> Result<()> {
        Ok(())
    }

    fn load(&mut self, data: &[u8]) -> Result<()> {
        let script: Script = serde_json::from_slice(data)
            .map_err(|e| StreamError::Engine(format!("bad script: {}", e)))?;
        self.script = Some(script);
        Ok(())
    }

    fn prepare_render(&mut self, prep: &RenderPreparation) -> Result<()> {
        let Some(script) = self.script.as_ref() else {
            return Err(StreamError::Engine("no script loaded".into()));
        };
        if script.prepare_limit.is_some_and(|limit| self.prepares >= limit) {
            self.prepared = false;
            return Err(StreamError::Engine("scripted prepare failure".into()));
        }
        self.prepares += 1;
        self.looping = prep.loop_enabled();
        self.loop_start = (prep.loop_offset_seconds * 44_100.0) as u64;
        if self.loop_start >= script.total_frames {
            self.loop_start = 0;
        }
        self.cursor = 0;
        self.prepared = true;
        self.finished = false;
        Ok(())
    }

    fn pull_samples(&mut self, out: &mut [i16]) -> PullResult {
        let Some(script) = self.script.as_ref() else {
            return PullResult::failed();
        };
        if !self.prepared {
            return PullResult::failed();
        }
        if script.stall {
            return PullResult::filled(0);
        }

        let mut wanted = out.len() / 2;
        if script.max_fill_frames > 0 {
            wanted = wanted.min(script.max_fill_frames);
        }

        let mut frames = 0;
        let mut wraps = 0;
        while frames < wanted {
            if script.fail_at_frame == Some(self.cursor) {
                return PullResult {
                    keep_going: false,
                    ..PullResult::filled(frames)
                }
                .with_wraps(wraps);
            }
            let position = if script.monotonic && script.total_frames > 0 {
                self.cursor % script.total_frames
            } else {
                self.cursor
            };
            if !script.monotonic && self.cursor >= script.total_frames {
                if self.looping && script.total_frames > 0 {
                    self.cursor = self.loop_start;
                    wraps += 1;
                    continue;
                }
                self.finished = true;
                break;
            }
            if script.monotonic && !self.looping && self.cursor >= script.total_frames {
                self.finished = true;
                break;
            }
            if script.monotonic && position == 0 && self.cursor > 0 {
                wraps += 1;
            }
            let (left, right) = sample_at(position);
            out[frames * 2] = left;
            out[frames * 2 + 1] = right;
            self.cursor += 1;
            frames += 1;
        }

        if !self.looping && self.cursor >= script.total_frames {
            self.finished = true;
        }
        if self.finished {
            PullResult::finished(frames).with_wraps(wraps)
        } else {
            PullResult::filled(frames).with_wraps(wraps)
        }
    }

    fn total_sample_count(&self) -> u64 {
        self.script.as_ref().map_or(0, |s| s.total_frames)
    }

    fn sample_cursor(&self) -> u64 {
        self.cursor
    }

    fn set_sample_cursor(&mut self, value: u64) {
        self.cursor = value;
        self.finished = false;
    }

    fn tempo(&self) -> f64 {
        self.script.as_ref().map_or(0.0, |s| s.tempo)
    }

    fn beats_per_bar(&self) -> u32 {
        self.script.as_ref().map_or(0, |s| s.beats_per_bar)
    }

    fn beat_count(&self) -> u32 {
        self.script.as_ref().map_or(0, |s| s.beat_count)
    }
}
