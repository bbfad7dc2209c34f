//! Offline export of playback sessions
//!
//! Renders a [`PlaybackSession`](crate::PlaybackSession) faster than real
//! time and writes the real audio it produces to a file.
//!
//! # Examples
//!
//! ```no_run
//! # #[cfg(feature = "psg-dump")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use modstream::{export_to_wav, ExportConfig, PsgDumpEngine, StreamAsset};
//!
//! let asset = Arc::new(modstream::load_file::<PsgDumpEngine>("song.psgd")?);
//! let mut session = asset.create_session()?;
//!
//! let summary = export_to_wav(&mut session, "output.wav", &ExportConfig::new().max_seconds(30.0))?;
//! println!("{} frames, {} loops", summary.frames_written, summary.loops);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "psg-dump"))]
//! # fn main() {}
//! ```

mod wav;

pub use wav::export_to_wav;

use crate::constants::SCRATCH_FRAMES;

/// Export configuration options
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Position to start rendering from, in seconds
    pub start_seconds: f64,
    /// Frames rendered per session call (default: 2048)
    pub chunk_frames: usize,
    /// Render budget in seconds; `None` renders one pass plus one chunk
    pub max_seconds: Option<f64>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            start_seconds: 0.0,
            chunk_frames: SCRATCH_FRAMES,
            max_seconds: None,
        }
    }
}

impl ExportConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start rendering at `seconds`
    pub fn start_at(mut self, seconds: f64) -> Self {
        self.start_seconds = seconds;
        self
    }

    /// Set frames rendered per session call
    pub fn chunk_frames(mut self, frames: usize) -> Self {
        self.chunk_frames = frames;
        self
    }

    /// Cap the render at `seconds` of output
    pub fn max_seconds(mut self, seconds: f64) -> Self {
        self.max_seconds = Some(seconds);
        self
    }
}

/// Outcome of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    /// Stereo frames of real audio written
    pub frames_written: u64,
    /// Loop wraps observed while rendering
    pub loops: u32,
    /// The stream ended before the render budget ran out
    pub reached_end: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ExportConfig::new()
            .start_at(1.5)
            .chunk_frames(512)
            .max_seconds(10.0);
        assert_eq!(config.start_seconds, 1.5);
        assert_eq!(config.chunk_frames, 512);
        assert_eq!(config.max_seconds, Some(10.0));
        assert_eq!(ExportConfig::default().chunk_frames, 2048);
    }
}
