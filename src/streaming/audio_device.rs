//! Audio device integration using rodio
//!
//! Plays a [`SharedSession`] on the system audio device. The rodio mixer
//! thread pulls interleaved samples through [`SessionSource`], which renders
//! one chunk per session lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rodio::{OutputStream, Sink, Source};
use tracing::debug;

use super::{SharedSession, StreamConfig};
use crate::constants::OUTPUT_CHANNELS;
use crate::engine::SynthEngine;
use crate::{Result, StreamError};

/// Audio source that renders from a shared playback session
///
/// Yields silence while the session stalls and ends once the session has
/// stopped and its real audio has been drained.
pub struct SessionSource<E: SynthEngine> {
    session: SharedSession<E>,
    sample_rate: u32,
    finished: Arc<AtomicBool>,
    /// Interleaved chunk buffer (reduces lock contention)
    buffer: Vec<f32>,
    /// Valid samples in `buffer`
    buffer_len: usize,
    /// Current position in `buffer`
    buffer_pos: usize,
}

impl<E: SynthEngine> SessionSource<E> {
    /// Create a source rendering `chunk_frames` frames per lock
    pub fn new(session: SharedSession<E>, chunk_frames: usize) -> Self {
        let sample_rate = session.lock().sample_rate();
        let samples = chunk_frames.max(1) * OUTPUT_CHANNELS as usize;
        SessionSource {
            session,
            sample_rate,
            finished: Arc::new(AtomicBool::new(false)),
            buffer: vec![0.0f32; samples],
            buffer_len: 0,
            buffer_pos: 0,
        }
    }

    /// Flag set once the source has yielded its last sample
    pub fn finished_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.finished)
    }

    fn refill(&mut self) -> bool {
        let mut session = self.session.lock();
        if !session.is_playing() {
            return false;
        }
        let produced = session.render_interleaved(&mut self.buffer);
        // Keep stall padding to hold real time; drop the padding after the end
        self.buffer_len = if session.is_playing() {
            self.buffer.len()
        } else {
            produced * OUTPUT_CHANNELS as usize
        };
        self.buffer_pos = 0;
        self.buffer_len > 0
    }
}

impl<E: SynthEngine> Source for SessionSource<E> {
    fn current_frame_len(&self) -> Option<usize> {
        let remaining = self.buffer_len - self.buffer_pos;
        if remaining > 0 {
            Some(remaining)
        } else {
            Some(self.buffer.len())
        }
    }

    fn channels(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        // Looping streams have no total duration
        None
    }
}

impl<E: SynthEngine> Iterator for SessionSource<E> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.buffer_pos >= self.buffer_len
            && (self.finished.load(Ordering::Relaxed) || !self.refill())
        {
            self.finished.store(true, Ordering::Relaxed);
            return None;
        }
        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(sample)
    }
}

/// Audio playback device using rodio
///
/// A device can be played again after [`stop`](Self::stop) or after the
/// stream ends; `play` queues a fresh source when the old one is gone.
pub struct AudioDevice<E: SynthEngine> {
    _stream: OutputStream,
    sink: Sink,
    session: SharedSession<E>,
    chunk_frames: usize,
    /// Finished flag of the currently queued source
    finished: Mutex<Arc<AtomicBool>>,
}

impl<E: SynthEngine + 'static> AudioDevice<E> {
    /// Open the default output device for `session`
    ///
    /// The device starts paused; call [`play`](Self::play) to begin.
    ///
    /// # Errors
    /// `ConfigError` if `config` is invalid or its sample rate differs from
    /// the session's, `AudioDeviceError` if no output stream can be opened.
    pub fn new(session: SharedSession<E>, config: &StreamConfig) -> Result<Self> {
        config.validate()?;
        let session_rate = session.lock().sample_rate();
        if session_rate != config.sample_rate {
            return Err(StreamError::ConfigError(format!(
                "session renders at {} Hz but stream is configured for {} Hz",
                session_rate, config.sample_rate
            )));
        }

        // Create output stream
        let (stream, stream_handle) = OutputStream::try_default().map_err(|e| {
            StreamError::AudioDeviceError(format!("Failed to create audio stream: {}", e))
        })?;

        // Create sink for playback
        let sink = Sink::try_new(&stream_handle).map_err(|e| {
            StreamError::AudioDeviceError(format!("Failed to create audio sink: {}", e))
        })?;
        sink.pause();

        let source = SessionSource::new(Arc::clone(&session), config.chunk_frames);
        let finished = source.finished_flag();
        sink.append(source);
        debug!(
            sample_rate = config.sample_rate,
            chunk_frames = config.chunk_frames,
            latency_ms = config.latency_ms(),
            "audio device opened"
        );

        Ok(AudioDevice {
            _stream: stream,
            sink,
            session,
            chunk_frames: config.chunk_frames,
            finished: Mutex::new(finished),
        })
    }

    /// Start the session at `from_seconds` and begin output
    pub fn play(&self, from_seconds: f64) -> Result<()> {
        self.session.lock().start(from_seconds)?;

        let mut finished = self.finished.lock();
        if finished.load(Ordering::Relaxed) || self.sink.empty() {
            let source = SessionSource::new(Arc::clone(&self.session), self.chunk_frames);
            *finished = source.finished_flag();
            self.sink.append(source);
            debug!("queued a fresh session source");
        }
        self.sink.play();
        Ok(())
    }

    /// Pause output; the session keeps its position
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume output after [`pause`](Self::pause)
    pub fn resume(&self) {
        self.sink.play();
    }

    /// Stop the session and drop the queued source
    pub fn stop(&self) {
        self.session.lock().stop();
        self.finished.lock().store(true, Ordering::Relaxed);
        self.sink.stop();
    }

    /// Whether output is paused
    pub fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    /// True once the stream has ended and been drained
    pub fn is_finished(&self) -> bool {
        self.finished.lock().load(Ordering::Relaxed) || self.sink.empty()
    }

    /// Block until the stream has ended
    pub fn wait_until_end(&self) {
        self.sink.sleep_until_end();
    }

    /// The session this device plays
    pub fn session(&self) -> &SharedSession<E> {
        &self.session
    }
}
