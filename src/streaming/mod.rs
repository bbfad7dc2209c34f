//! Real-time audio output
//!
//! A playback session is not internally synchronized, so a driver shares it
//! between the audio thread and the control thread behind a mutex
//! ([`SharedSession`]). With the `streaming` feature, [`SessionSource`] feeds
//! such a session to rodio and [`AudioDevice`] owns the output stream.

#[cfg(feature = "streaming")]
mod audio_device;

#[cfg(feature = "streaming")]
pub use audio_device::{AudioDevice, SessionSource};

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_SAMPLE_RATE, OUTPUT_CHANNELS};
use crate::engine::SynthEngine;
use crate::session::PlaybackSession;
use crate::{Result, StreamError};

/// Largest chunk a driver may render per lock
pub const MAX_CHUNK_FRAMES: usize = 8192;

/// Session shared between the audio thread and a control thread
pub type SharedSession<E> = Arc<Mutex<PlaybackSession<E>>>;

/// Wrap a session for use from several threads
pub fn share<E: SynthEngine>(session: PlaybackSession<E>) -> SharedSession<E> {
    Arc::new(Mutex::new(session))
}

/// Configuration for streaming playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of audio channels (always 2)
    pub channels: u16,

    /// Frames rendered per session lock
    /// Larger chunks = more latency but fewer lock round trips
    /// Typical: 1024-4096 frames (23ms-93ms at 44.1kHz)
    pub chunk_frames: usize,
}

impl StreamConfig {
    /// Create a streaming configuration optimized for low latency
    /// Chunk = 1024 frames ≈ 23ms @ 44.1kHz
    pub fn low_latency(sample_rate: u32) -> Self {
        StreamConfig {
            sample_rate,
            channels: OUTPUT_CHANNELS,
            chunk_frames: 1024,
        }
    }

    /// Create a streaming configuration optimized for stability
    /// Chunk = 4096 frames ≈ 93ms @ 44.1kHz
    pub fn stable(sample_rate: u32) -> Self {
        StreamConfig {
            sample_rate,
            channels: OUTPUT_CHANNELS,
            chunk_frames: 4096,
        }
    }

    /// Get latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        ((self.chunk_frames as f32) / (self.sample_rate as f32)) * 1000.0
    }

    /// Check the configuration can drive a session
    pub fn validate(&self) -> Result<()> {
        if self.channels != OUTPUT_CHANNELS {
            return Err(StreamError::ConfigError(format!(
                "output must be stereo, got {} channels",
                self.channels
            )));
        }
        if self.sample_rate == 0 {
            return Err(StreamError::ConfigError(
                "sample rate must be greater than zero".into(),
            ));
        }
        if !(1..=MAX_CHUNK_FRAMES).contains(&self.chunk_frames) {
            return Err(StreamError::ConfigError(format!(
                "chunk size {} outside 1..={}",
                self.chunk_frames, MAX_CHUNK_FRAMES
            )));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::stable(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scripted::{Script, ScriptedEngine};
    use crate::StreamAsset;
    use approx::assert_relative_eq;

    #[test]
    fn test_stream_config_latency() {
        let config = StreamConfig::low_latency(44100);
        let latency = config.latency_ms();
        assert!(latency > 20.0 && latency < 25.0);
        assert_relative_eq!(StreamConfig::stable(48_000).latency_ms(), 85.333, epsilon = 0.01);
    }

    #[test]
    fn test_validate() {
        assert!(StreamConfig::default().validate().is_ok());

        let mono = StreamConfig {
            channels: 1,
            ..StreamConfig::default()
        };
        assert!(matches!(mono.validate(), Err(StreamError::ConfigError(_))));

        let silent = StreamConfig::low_latency(0);
        assert!(silent.validate().is_err());
        assert_eq!(silent.latency_ms(), 0.0);

        let huge = StreamConfig {
            chunk_frames: MAX_CHUNK_FRAMES + 1,
            ..StreamConfig::default()
        };
        assert!(huge.validate().is_err());
    }

    #[test]
    fn test_config_json() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"sample_rate":48000,"channels":2,"chunk_frames":512}"#)
                .unwrap();
        assert_eq!(config.sample_rate, 48_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shared_session_across_threads() {
        let asset =
            Arc::new(StreamAsset::<ScriptedEngine>::load(&Script::frames(1_000).to_bytes()).unwrap());
        let shared = share(asset.create_session().unwrap());
        shared.lock().start(0.0).unwrap();

        let audio = Arc::clone(&shared);
        let handle = std::thread::spawn(move || {
            let mut buffer = [0.0f32; 400];
            let mut total = 0;
            while audio.lock().is_playing() {
                total += audio.lock().render_interleaved(&mut buffer);
            }
            total
        });
        assert_eq!(handle.join().unwrap(), 1_000);
        assert!(!shared.lock().is_playing());
    }
}
