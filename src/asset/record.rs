//! Persisted asset layout
//!
//! `raw_bytes` is the only authoritative field. Everything else is a cache
//! that can be recomputed from it, stored alongside for cheap inspection.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Serializable snapshot of a [`StreamAsset`](super::StreamAsset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Encoded module bytes, stored verbatim
    pub raw_bytes: Vec<u8>,
    /// Output sample rate the metadata was computed for
    pub sample_rate: u32,
    /// Cached length of one pass in seconds
    pub length_seconds: f64,
    /// Loop policy
    pub loop_enabled: bool,
    /// Loop restart position in seconds
    pub loop_offset_seconds: f64,
    /// Cached tempo
    pub tempo_bpm: f64,
    /// Cached beats per bar
    pub beats_per_bar: u32,
    /// Cached beat count
    pub beat_count: u32,
}

impl AssetRecord {
    /// Encode as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamError;

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = AssetRecord::from_json("{ \"raw_bytes\": 3 }").unwrap_err();
        assert!(matches!(err, StreamError::Serialization(_)));
    }

    #[test]
    fn test_json_field_names() {
        let record = AssetRecord {
            raw_bytes: vec![1, 2, 3],
            sample_rate: 44_100,
            length_seconds: 1.5,
            loop_enabled: true,
            loop_offset_seconds: 0.0,
            tempo_bpm: 120.0,
            beats_per_bar: 4,
            beat_count: 3,
        };
        let json = record.to_json().unwrap();
        assert!(json.contains("\"raw_bytes\":[1,2,3]"));
        assert!(json.contains("\"loop_enabled\":true"));
        assert_eq!(AssetRecord::from_json(&json).unwrap(), record);
    }
}
