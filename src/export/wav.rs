//! WAV file export functionality

use std::path::Path;

use tracing::info;

use super::{ExportConfig, ExportSummary};
use crate::constants::OUTPUT_CHANNELS;
use crate::engine::SynthEngine;
use crate::frame::AudioFrame;
use crate::session::PlaybackSession;
use crate::{Result, StreamError};

/// Render a session to a 16-bit stereo WAV file
///
/// Starts `session` at `config.start_seconds` and renders until the stream
/// ends or the render budget is spent. Only real audio is written: the
/// silence a session pads after the end of the stream is dropped. The session
/// is stopped on return.
///
/// # Arguments
///
/// * `session` - Session to render; any pass in progress is discarded
/// * `output_path` - Path where the WAV file will be written
/// * `config` - Start position, chunking and render budget
///
/// # Errors
/// `ConfigError` for a zero chunk size or invalid budget, the session's error
/// if it cannot start, `AudioFileError` if the file cannot be written.
pub fn export_to_wav<E: SynthEngine, P: AsRef<Path>>(
    session: &mut PlaybackSession<E>,
    output_path: P,
    config: &ExportConfig,
) -> Result<ExportSummary> {
    if config.chunk_frames == 0 {
        return Err(StreamError::ConfigError(
            "export chunk size must be at least one frame".into(),
        ));
    }
    let sample_rate = session.sample_rate();
    let budget = match config.max_seconds {
        Some(seconds) if seconds.is_finite() && seconds >= 0.0 => {
            (seconds * sample_rate as f64) as u64
        }
        Some(seconds) => {
            return Err(StreamError::ConfigError(format!(
                "invalid export length {}",
                seconds
            )))
        }
        None => session.asset().total_samples() + config.chunk_frames as u64,
    };

    session.start(config.start_seconds)?;

    let spec = hound::WavSpec {
        channels: OUTPUT_CHANNELS,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output_path.as_ref(), spec).map_err(|e| {
        StreamError::AudioFileError(format!("Failed to create WAV file: {}", e))
    })?;

    let mut buffer = vec![AudioFrame::SILENCE; config.chunk_frames];
    let mut rendered = 0u64;
    let mut frames_written = 0u64;

    // Budget counts requested frames so a stalled engine cannot spin forever
    while session.is_playing() && rendered < budget {
        let want = (budget - rendered).min(config.chunk_frames as u64) as usize;
        let produced = session.render(&mut buffer[..want]);
        rendered += want as u64;

        for frame in &buffer[..produced] {
            let (left, right) = frame.to_i16();
            writer
                .write_sample(left)
                .and_then(|_| writer.write_sample(right))
                .map_err(|e| StreamError::AudioFileError(format!("Failed to write sample: {}", e)))?;
        }
        frames_written += produced as u64;
    }

    let summary = ExportSummary {
        frames_written,
        loops: session.loop_count(),
        reached_end: !session.is_playing(),
    };
    session.stop();

    writer.finalize().map_err(|e| {
        StreamError::AudioFileError(format!("Failed to finalize WAV file: {}", e))
    })?;

    info!(
        path = %output_path.as_ref().display(),
        frames = summary.frames_written,
        loops = summary.loops,
        reached_end = summary.reached_end,
        "export complete"
    );
    Ok(summary)
}
