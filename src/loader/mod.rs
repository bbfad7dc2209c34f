//! Module File Loader
//!
//! Reads module files from disk into [`StreamAsset`]s and persists imported
//! assets as JSON [`AssetRecord`]s.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::asset::{AssetRecord, StreamAsset};
use crate::constants::DEFAULT_SAMPLE_RATE;
use crate::engine::SynthEngine;
use crate::{Result, StreamError};

/// File extension of persisted asset records
pub const RECORD_EXTENSION: &str = "mstr";

/// Output rate and loop policy applied when importing a module
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Wrap at the end of the sequence
    pub loop_enabled: bool,
    /// Loop restart position in seconds
    pub loop_offset_seconds: f64,
    /// Output sample rate the module is decoded for
    pub sample_rate: u32,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            loop_enabled: true,
            loop_offset_seconds: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|e| format!("Failed to read file '{}': {}", path.display(), e).into())
}

/// Load a module file and decode it with engine `E`
pub fn load_file<E: SynthEngine>(path: impl AsRef<Path>) -> Result<StreamAsset<E>> {
    let path = path.as_ref();
    let data = read_bytes(path)?;
    let asset = StreamAsset::load(&data)?;
    debug!(path = %path.display(), bytes = data.len(), "loaded module file");
    Ok(asset)
}

/// Record path for `dest`, with the record extension appended if missing
pub fn record_path(dest: impl AsRef<Path>) -> PathBuf {
    let dest = dest.as_ref();
    match dest.extension() {
        Some(ext) if ext == RECORD_EXTENSION => dest.to_path_buf(),
        _ => {
            let mut name = dest.as_os_str().to_os_string();
            name.push(".");
            name.push(RECORD_EXTENSION);
            PathBuf::from(name)
        }
    }
}

/// Import a module file and persist it as an asset record
///
/// Decodes `source` with engine `E` at the sample rate from `options`,
/// applies its loop policy and writes the record to `dest`. Returns the record that was written.
///
/// # Errors
/// Fails if the source cannot be read or decoded, if it holds no module data,
/// or if the record cannot be written.
pub fn import_file<E: SynthEngine>(
    source: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: &ImportOptions,
) -> Result<AssetRecord> {
    let source = source.as_ref();
    let data = read_bytes(source)?;
    let asset = StreamAsset::<E>::load_with_sample_rate(&data, options.sample_rate)?;
    if asset.is_empty() {
        return Err(StreamError::EmptyAsset);
    }
    asset.set_loop(options.loop_enabled);
    asset.set_loop_offset(options.loop_offset_seconds);

    let record = asset.to_record();
    let dest = record_path(dest);
    fs::write(&dest, record.to_json()?)?;
    info!(
        source = %source.display(),
        dest = %dest.display(),
        length_seconds = record.length_seconds,
        "imported module"
    );
    Ok(record)
}

/// Restore an asset from a record written by [`import_file`]
pub fn load_imported<E: SynthEngine>(path: impl AsRef<Path>) -> Result<StreamAsset<E>> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read record '{}': {}", path.display(), e))?;
    let record = AssetRecord::from_json(&json)?;
    StreamAsset::from_record(&record)
}
