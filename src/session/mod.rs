//! Playback Sessions
//!
//! A [`PlaybackSession`] is the pull-based mixer between a synthesis engine
//! and an audio callback. Every [`render`](PlaybackSession::render) call on a
//! playing session fills the whole output buffer: real audio first, then
//! silence if the stream ends part-way through. The return value tells the
//! caller how many leading frames were real audio.
//!
//! The render path performs no allocation, I/O or locking. The scratch buffer
//! is allocated once with the session, and each call does a bounded number of
//! engine pulls.
//!
//! Sessions are not internally synchronized. A driver that calls
//! `start`/`seek`/`stop` from a control thread while rendering on the audio
//! thread must serialize access itself, e.g. through a
//! [`SharedSession`](crate::SharedSession).

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::asset::StreamAsset;
use crate::constants::{MAX_STALLED_PULLS, SCRATCH_SAMPLES};
use crate::engine::{RenderPreparation, SynthEngine};
use crate::frame::AudioFrame;
use crate::Result;

/// Playback state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Not rendering; `render` returns 0 frames
    #[default]
    Stopped,
    /// Rendering frames from the engine
    Playing,
}

/// One playback of a [`StreamAsset`]
pub struct PlaybackSession<E: SynthEngine> {
    asset: Arc<StreamAsset<E>>,
    engine: E,
    state: PlaybackState,
    loop_count: u32,
    scratch: Box<[i16; SCRATCH_SAMPLES]>,
}

impl<E: SynthEngine> PlaybackSession<E> {
    /// Wrap an engine that already holds the asset's module data
    pub(crate) fn new(asset: Arc<StreamAsset<E>>, engine: E) -> Self {
        PlaybackSession {
            asset,
            engine,
            state: PlaybackState::Stopped,
            loop_count: 0,
            scratch: Box::new([0; SCRATCH_SAMPLES]),
        }
    }

    /// Begin a fresh render pass positioned at `from_seconds`
    ///
    /// The asset's loop policy is read here, once per pass. Any previous pass
    /// is discarded; this is not a resume.
    ///
    /// # Errors
    /// Returns the engine's error if it cannot prepare a render pass. The
    /// session is left stopped.
    pub fn start(&mut self, from_seconds: f64) -> Result<()> {
        let loop_settings = self.asset.loop_settings();
        let prep = RenderPreparation::new(loop_settings.enabled)
            .with_loop_offset(loop_settings.offset_seconds);

        self.state = PlaybackState::Stopped;
        self.engine.prepare_render(&prep)?;

        self.loop_count = 0;
        self.state = PlaybackState::Playing;
        self.seek(from_seconds);
        debug!(
            engine = self.engine.name(),
            from_seconds,
            looping = loop_settings.enabled,
            "playback session started"
        );
        Ok(())
    }

    /// Stop rendering; takes effect on the next `render` call
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    /// Move the playback position; no-op unless playing
    ///
    /// Negative, NaN, and at-or-past-the-end targets all wrap to the start.
    pub fn seek(&mut self, seconds: f64) {
        if !self.is_playing() {
            return;
        }
        let duration = self.asset.length_seconds();
        let seconds = if seconds.is_nan() || seconds < 0.0 || seconds >= duration {
            0.0
        } else {
            seconds
        };
        let cursor = (seconds * self.asset.sample_rate() as f64) as u64;
        self.engine.set_sample_cursor(cursor);
    }

    /// Render `out.len()` stereo frames
    ///
    /// Returns the number of leading frames that are real audio. When the
    /// stream ends inside this call the remaining frames are set to silence
    /// and the session stops. A stopped session returns 0 and leaves `out`
    /// untouched.
    pub fn render(&mut self, out: &mut [AudioFrame]) -> usize {
        self.mix(out.len(), |index, frame| out[index] = frame)
    }

    /// Render into an interleaved `[L, R, L, R, ...]` buffer
    ///
    /// Same contract as [`render`](Self::render) with
    /// `frame_count = out.len() / 2`. A trailing odd sample is zeroed.
    pub fn render_interleaved(&mut self, out: &mut [f32]) -> usize {
        if !self.is_playing() {
            return 0;
        }
        if !out.len().is_multiple_of(2) {
            if let Some(last) = out.last_mut() {
                *last = 0.0;
            }
        }
        self.mix(out.len() / 2, |index, frame| {
            out[index * 2] = frame.left;
            out[index * 2 + 1] = frame.right;
        })
    }

    fn mix(&mut self, frame_count: usize, mut emit: impl FnMut(usize, AudioFrame)) -> usize {
        if !self.is_playing() {
            return 0;
        }

        let mut produced = 0;
        let mut stalled = 0;

        while produced < frame_count {
            let request = ((frame_count - produced) * 2).min(SCRATCH_SAMPLES);
            let pull = self.engine.pull_samples(&mut self.scratch[..request]);

            // Never trust the engine to stay inside the request
            let frames = pull.frames_filled().min(request / 2);
            for (offset, pair) in self.scratch[..frames * 2].chunks_exact(2).enumerate() {
                emit(produced + offset, AudioFrame::from_i16(pair[0], pair[1]));
            }
            produced += frames;

            if pull.wraps > 0 {
                self.loop_count = self.loop_count.saturating_add(pull.wraps);
                trace!(loop_count = self.loop_count, "sequence wrapped");
            }

            if pull.is_terminal() {
                pad_silence(produced, frame_count, &mut emit);
                self.state = PlaybackState::Stopped;
                debug!(
                    frames = produced,
                    engine_failed = !pull.keep_going,
                    "stream ended, session stopped"
                );
                return produced;
            }

            if frames == 0 {
                stalled += 1;
                if stalled >= MAX_STALLED_PULLS {
                    pad_silence(produced, frame_count, &mut emit);
                    warn!(
                        engine = self.engine.name(),
                        frames = produced,
                        "engine produced no samples; padded with silence"
                    );
                    return produced;
                }
            } else {
                stalled = 0;
            }
        }

        frame_count
    }

    /// Position within the current pass, in seconds
    ///
    /// Always reported modulo one pass, however many loops have elapsed.
    pub fn playback_position(&self) -> f64 {
        let total = self.engine.total_sample_count();
        if total == 0 {
            return 0.0;
        }
        (self.engine.sample_cursor() % total) as f64 / self.asset.sample_rate() as f64
    }

    /// Loop wraps reported by the engine since the last `start`
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// True from `start` until the stream ends or `stop` is called
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Output sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.asset.sample_rate()
    }

    /// Raw engine cursor in frames
    pub fn sample_cursor(&self) -> u64 {
        self.engine.sample_cursor()
    }

    /// The asset this session plays
    pub fn asset(&self) -> &Arc<StreamAsset<E>> {
        &self.asset
    }

    /// The session's engine instance
    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: SynthEngine> fmt::Debug for PlaybackSession<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("engine", &self.engine.name())
            .field("state", &self.state)
            .field("loop_count", &self.loop_count)
            .field("sample_cursor", &self.engine.sample_cursor())
            .finish()
    }
}

fn pad_silence(from: usize, to: usize, emit: &mut impl FnMut(usize, AudioFrame)) {
    for index in from..to {
        emit(index, AudioFrame::SILENCE);
    }
}
