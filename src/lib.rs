//! Streaming playback core for chiptune modules
//!
//! Turns an encoded chiptune module into a continuous, seekable, loopable
//! stream of stereo `f32` frames suitable for a real-time audio callback.
//! Decoding and synthesis are delegated to a [`SynthEngine`]; this crate owns
//! the pull-based mixing loop around it.
//!
//! # Features
//! - Decode-once [`StreamAsset`] with cached length, tempo and beat layout
//! - [`PlaybackSession`] that always fills the requested number of frames,
//!   padding with silence when the stream ends mid-buffer
//! - Cheap seeking, loop counting and position reporting modulo one loop
//! - Persisted asset records, file import, and offline WAV export
//! - Optional rodio-backed real-time output
//!
//! # Crate feature flags
//! - `psg-dump` (default): Reference engine for PSG register-dump modules (`psg_dump`)
//! - `streaming` (opt-in): Real-time audio output (enables optional `rodio` dep)
//! - `cli` (opt-in): The `modstream` command line player
//!
//! # Quick start
//! ```no_run
//! # #[cfg(feature = "psg-dump")]
//! # {
//! use std::sync::Arc;
//! use modstream::{AudioFrame, PsgDumpEngine, StreamAsset};
//!
//! let data = std::fs::read("song.psgd").unwrap();
//! let asset = Arc::new(StreamAsset::<PsgDumpEngine>::load(&data).unwrap());
//! let mut session = asset.create_session().unwrap();
//! session.start(0.0).unwrap();
//!
//! let mut buffer = [AudioFrame::SILENCE; 512];
//! while session.is_playing() {
//!     let produced = session.render(&mut buffer);
//!     // hand `buffer` to the audio device; `produced` frames are real audio
//!     # let _ = produced;
//! }
//! # }
//! ```

#![warn(missing_docs)]

pub mod asset;
pub mod constants;
pub mod engine;
pub mod export;
pub mod frame;
pub mod loader;
#[cfg(feature = "psg-dump")]
pub mod psg_dump; // Reference Synthesis Engine
pub mod session;
pub mod streaming; // Audio Output & Streaming

/// Error types for module streaming operations
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// The synthesis engine could not initialize or parse the module data
    #[error("Asset decode error: {0}")]
    AssetDecode(String),

    /// A playback session was requested from an asset that holds no data
    #[error("Stream asset has no module data; load a module before creating a playback session")]
    EmptyAsset,

    /// Failure reported by a synthesis engine
    #[error("Engine error: {0}")]
    Engine(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Asset record (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error writing audio file
    #[error("Audio file write error: {0}")]
    AudioFileError(String),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for StreamError {
    /// Converts a String into `StreamError::Other`.
    ///
    /// Prefer the specific variants (`AssetDecode`, `Engine`, `ConfigError`)
    /// where the failure has a known category.
    fn from(msg: String) -> Self {
        StreamError::Other(msg)
    }
}

impl From<&str> for StreamError {
    fn from(msg: &str) -> Self {
        StreamError::Other(msg.to_string())
    }
}

/// Result type for streaming operations
pub type Result<T> = std::result::Result<T, StreamError>;

// Public API exports
pub use asset::{AssetRecord, LoopSettings, StreamAsset, StreamMetadata};
pub use engine::{PullResult, RenderFlags, RenderPreparation, SynthEngine};
pub use export::{export_to_wav, ExportConfig, ExportSummary};
pub use frame::AudioFrame;
pub use loader::{import_file, load_file, load_imported, ImportOptions};
#[cfg(feature = "psg-dump")]
pub use psg_dump::{PsgDumpBuilder, PsgDumpEngine};
pub use session::{PlaybackSession, PlaybackState};
pub use streaming::{SharedSession, StreamConfig};
#[cfg(feature = "streaming")]
pub use streaming::{AudioDevice, SessionSource};
