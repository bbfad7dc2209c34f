//! Stream Assets
//!
//! A [`StreamAsset`] holds the encoded module bytes together with metadata
//! derived once, at load time, by pre-rolling a synthesis engine. Assets are
//! shared (`Arc`) between any number of playback sessions; each session gets
//! its own engine instance.

mod record;

pub use record::AssetRecord;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::constants::{DEFAULT_SAMPLE_RATE, OUTPUT_CHANNELS};
use crate::engine::{RenderPreparation, SynthEngine};
use crate::session::PlaybackSession;
use crate::{Result, StreamError};

/// Metadata derived from a full engine pre-roll
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamMetadata {
    /// Length of one pass through the sequence in seconds
    pub length_seconds: f64,
    /// Length of one pass in frames at the asset's sample rate
    pub total_samples: u64,
    /// Tempo in beats per minute
    pub tempo_bpm: f64,
    /// Beats per bar
    pub beats_per_bar: u32,
    /// Total beats in the sequence
    pub beat_count: u32,
}

/// Loop policy applied by sessions when they start
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopSettings {
    /// Wrap at the end of the sequence instead of stopping
    pub enabled: bool,
    /// Loop restart position in seconds
    pub offset_seconds: f64,
}

/// Decoded chiptune module, ready to spawn playback sessions
pub struct StreamAsset<E: SynthEngine> {
    data: Vec<u8>,
    sample_rate: u32,
    metadata: StreamMetadata,
    loop_settings: RwLock<LoopSettings>,
    _engine: PhantomData<fn() -> E>,
}

impl<E: SynthEngine> StreamAsset<E> {
    /// An asset that was never loaded; refuses to create sessions
    pub fn empty(sample_rate: u32) -> Self {
        StreamAsset {
            data: Vec::new(),
            sample_rate,
            metadata: StreamMetadata::default(),
            loop_settings: RwLock::new(LoopSettings::default()),
            _engine: PhantomData,
        }
    }

    /// Decode module bytes at the default 44.1 kHz output rate
    pub fn load(data: &[u8]) -> Result<Self> {
        Self::load_with_sample_rate(data, DEFAULT_SAMPLE_RATE)
    }

    /// Decode module bytes for a specific output sample rate
    ///
    /// Runs a full engine initialization and render preparation to derive
    /// length, tempo and beat layout, then keeps a verbatim copy of `data`.
    ///
    /// # Errors
    /// `ConfigError` for a zero sample rate, `AssetDecode` if the bytes are
    /// empty or the engine rejects them.
    pub fn load_with_sample_rate(data: &[u8], sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(StreamError::ConfigError(
                "sample rate must be greater than zero".into(),
            ));
        }
        if data.is_empty() {
            return Err(StreamError::AssetDecode("module data is empty".into()));
        }

        let mut engine = open_engine::<E>(data, sample_rate)?;
        engine
            .prepare_render(&RenderPreparation::new(true))
            .map_err(into_decode_error)?;

        let total_samples = engine.total_sample_count();
        let metadata = StreamMetadata {
            length_seconds: total_samples as f64 / sample_rate as f64,
            total_samples,
            tempo_bpm: engine.tempo(),
            beats_per_bar: engine.beats_per_bar(),
            beat_count: engine.beat_count(),
        };
        debug!(
            engine = engine.name(),
            bytes = data.len(),
            length_seconds = metadata.length_seconds,
            tempo_bpm = metadata.tempo_bpm,
            "decoded stream asset"
        );

        Ok(StreamAsset {
            data: data.to_vec(),
            sample_rate,
            metadata,
            loop_settings: RwLock::new(LoopSettings::default()),
            _engine: PhantomData,
        })
    }

    /// Create an independent playback session over this asset
    ///
    /// # Errors
    /// `EmptyAsset` if the asset holds no module data, `AssetDecode` if a new
    /// engine instance cannot be initialized from it.
    pub fn create_session(self: &Arc<Self>) -> Result<PlaybackSession<E>> {
        if self.data.is_empty() {
            warn!("refusing to create a playback session from an empty stream asset");
            return Err(StreamError::EmptyAsset);
        }
        let engine = open_engine::<E>(&self.data, self.sample_rate).inspect_err(|e| {
            warn!(error = %e, "failed to initialize engine for playback session");
        })?;
        Ok(PlaybackSession::new(Arc::clone(self), engine))
    }

    /// Enable or disable looping for sessions started from now on
    pub fn set_loop(&self, enabled: bool) {
        self.loop_settings.write().enabled = enabled;
    }

    /// Whether sessions wrap at the end of the sequence
    pub fn has_loop(&self) -> bool {
        self.loop_settings.read().enabled
    }

    /// Set the loop restart position; negative or non-finite values become 0
    pub fn set_loop_offset(&self, seconds: f64) {
        let seconds = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            0.0
        };
        self.loop_settings.write().offset_seconds = seconds;
    }

    /// Loop restart position in seconds
    pub fn loop_offset(&self) -> f64 {
        self.loop_settings.read().offset_seconds
    }

    /// Snapshot of the current loop policy
    pub fn loop_settings(&self) -> LoopSettings {
        *self.loop_settings.read()
    }

    /// Length of one pass in seconds
    pub fn length_seconds(&self) -> f64 {
        self.metadata.length_seconds
    }

    /// Length of one pass in frames
    pub fn total_samples(&self) -> u64 {
        self.metadata.total_samples
    }

    /// Tempo in beats per minute
    pub fn tempo_bpm(&self) -> f64 {
        self.metadata.tempo_bpm
    }

    /// Beats per bar
    pub fn beats_per_bar(&self) -> u32 {
        self.metadata.beats_per_bar
    }

    /// Total beats in the sequence
    pub fn beat_count(&self) -> u32 {
        self.metadata.beat_count
    }

    /// All derived metadata
    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    /// Output sample rate negotiated at load time
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output channel count
    pub fn channels(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    /// Encoded module bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True if no module has been loaded
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Snapshot the asset into its persisted form
    pub fn to_record(&self) -> AssetRecord {
        let loop_settings = self.loop_settings();
        AssetRecord {
            raw_bytes: self.data.clone(),
            sample_rate: self.sample_rate,
            length_seconds: self.metadata.length_seconds,
            loop_enabled: loop_settings.enabled,
            loop_offset_seconds: loop_settings.offset_seconds,
            tempo_bpm: self.metadata.tempo_bpm,
            beats_per_bar: self.metadata.beats_per_bar,
            beat_count: self.metadata.beat_count,
        }
    }

    /// Restore an asset from its persisted form
    ///
    /// Only `raw_bytes` is trusted: metadata is recomputed by decoding it
    /// again. Loop policy is restored verbatim. A record without bytes yields
    /// an empty asset. A zero sample rate falls back to 44.1 kHz.
    pub fn from_record(record: &AssetRecord) -> Result<Self> {
        let sample_rate = if record.sample_rate == 0 {
            DEFAULT_SAMPLE_RATE
        } else {
            record.sample_rate
        };
        let asset = if record.raw_bytes.is_empty() {
            Self::empty(sample_rate)
        } else {
            let asset = Self::load_with_sample_rate(&record.raw_bytes, sample_rate)?;
            if (asset.metadata.length_seconds - record.length_seconds).abs() > 1e-6 {
                debug!(
                    cached = record.length_seconds,
                    decoded = asset.metadata.length_seconds,
                    "asset record metadata is stale; using decoded values"
                );
            }
            asset
        };
        asset.set_loop(record.loop_enabled);
        asset.set_loop_offset(record.loop_offset_seconds);
        Ok(asset)
    }
}

impl<E: SynthEngine> Default for StreamAsset<E> {
    fn default() -> Self {
        Self::empty(DEFAULT_SAMPLE_RATE)
    }
}

impl<E: SynthEngine> fmt::Debug for StreamAsset<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAsset")
            .field("bytes", &self.data.len())
            .field("sample_rate", &self.sample_rate)
            .field("metadata", &self.metadata)
            .field("loop_settings", &self.loop_settings())
            .finish()
    }
}

/// Initialize, configure and load a fresh engine instance
fn open_engine<E: SynthEngine>(data: &[u8], sample_rate: u32) -> Result<E> {
    let mut engine = E::init().map_err(into_decode_error)?;
    engine
        .configure_output(OUTPUT_CHANNELS, sample_rate)
        .map_err(into_decode_error)?;
    engine.load(data).map_err(into_decode_error)?;
    Ok(engine)
}

fn into_decode_error(err: StreamError) -> StreamError {
    match err {
        StreamError::AssetDecode(msg) => StreamError::AssetDecode(msg),
        other => StreamError::AssetDecode(other.to_string()),
    }
}
