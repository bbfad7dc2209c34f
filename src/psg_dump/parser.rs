//! PSG dump module parser
//!
//! A PSG dump is a register dump: a fixed header followed by one 16-byte
//! frame of PSG registers (R0-R15) per playback tick.
//!
//! Format details (big-endian):
//! - Header: 30 bytes (fixed size), magic `PSGD`
//! - Register data: 16 bytes per frame
//! - Trailing bytes after the last frame are ignored

use nom::bytes::complete::{tag, take};
use nom::combinator::map;
use nom::error::ErrorKind;
use nom::multi::count;
use nom::number::complete::{be_f32, be_u16, be_u32, be_u8};
use nom::sequence::tuple;
use nom::IResult;

use crate::{Result, StreamError};

/// File magic
pub const MAGIC: &[u8; 4] = b"PSGD";

/// Supported format version
pub const FORMAT_VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_LEN: usize = 30;

/// Registers stored per frame
pub const REGISTERS_PER_FRAME: usize = 16;

/// Maximum frame count accepted (about 5.5 hours at 50 Hz)
const MAX_FRAMES: u32 = 1_000_000;

/// PSG dump header
#[derive(Debug, Clone, PartialEq)]
pub struct PsgDumpHeader {
    /// Format version
    pub version: u16,
    /// Frames per second
    pub frame_rate: u16,
    /// PSG master clock in Hz
    pub master_clock: u32,
    /// Number of register frames
    pub frame_count: u32,
    /// Frame the sequence loops back to
    pub loop_frame: u32,
    /// Tempo in beats per minute
    pub tempo_bpm: f32,
    /// Beats per bar
    pub beats_per_bar: u8,
    /// Total beats in the sequence
    pub beat_count: u32,
}

/// Parsed PSG dump
#[derive(Debug, Clone)]
pub struct PsgModule {
    /// File header
    pub header: PsgDumpHeader,
    /// Register frames
    pub frames: Vec<[u8; REGISTERS_PER_FRAME]>,
}

impl PsgModule {
    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.header.frame_count as f64 / self.header.frame_rate as f64
    }
}

fn header(input: &[u8]) -> IResult<&[u8], PsgDumpHeader> {
    let (input, _) = tag(&MAGIC[..])(input)?;
    let (
        input,
        (
            version,
            frame_rate,
            master_clock,
            frame_count,
            loop_frame,
            tempo_bpm,
            beats_per_bar,
            _reserved,
            beat_count,
        ),
    ) = tuple((
        be_u16, be_u16, be_u32, be_u32, be_u32, be_f32, be_u8, be_u8, be_u32,
    ))(input)?;

    Ok((
        input,
        PsgDumpHeader {
            version,
            frame_rate,
            master_clock,
            frame_count,
            loop_frame,
            tempo_bpm,
            beats_per_bar,
            beat_count,
        },
    ))
}

fn frame(input: &[u8]) -> IResult<&[u8], [u8; REGISTERS_PER_FRAME]> {
    map(take(REGISTERS_PER_FRAME), |bytes: &[u8]| {
        let mut regs = [0u8; REGISTERS_PER_FRAME];
        regs.copy_from_slice(bytes);
        regs
    })(input)
}

/// Parse a complete PSG dump
pub fn parse_module(data: &[u8]) -> Result<PsgModule> {
    let (rest, mut header) = header(data).map_err(|e| nom_error("header", e))?;

    if header.version != FORMAT_VERSION {
        return Err(StreamError::Engine(format!(
            "unsupported PSG dump version {}",
            header.version
        )));
    }
    if header.frame_rate == 0 {
        return Err(StreamError::Engine("PSG dump frame rate is zero".into()));
    }
    if header.master_clock == 0 {
        return Err(StreamError::Engine("PSG dump master clock is zero".into()));
    }
    if header.frame_count == 0 {
        return Err(StreamError::Engine("PSG dump contains no frames".into()));
    }
    if header.frame_count > MAX_FRAMES {
        return Err(StreamError::Engine(format!(
            "PSG dump frame count {} exceeds limit of {}",
            header.frame_count, MAX_FRAMES
        )));
    }
    if !header.tempo_bpm.is_finite() || header.tempo_bpm < 0.0 {
        return Err(StreamError::Engine(format!(
            "invalid PSG dump tempo {}",
            header.tempo_bpm
        )));
    }
    if header.loop_frame >= header.frame_count {
        header.loop_frame = 0;
    }

    let (_, frames) =
        count(frame, header.frame_count as usize)(rest).map_err(|e| nom_error("frames", e))?;

    Ok(PsgModule { header, frames })
}

fn nom_error(section: &str, err: nom::Err<nom::error::Error<&[u8]>>) -> StreamError {
    let reason = match err {
        nom::Err::Incomplete(_) => "unexpected end of data".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => match e.code {
            ErrorKind::Tag => "invalid magic".to_string(),
            ErrorKind::Eof => "truncated".to_string(),
            other => other.description().to_string(),
        },
    };
    StreamError::Engine(format!("PSG dump {}: {}", section, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psg_dump::PsgDumpBuilder;

    #[test]
    fn test_parse_built_module() {
        let data = PsgDumpBuilder::new()
            .frame_rate(60)
            .loop_frame(2)
            .tempo(140.0)
            .beats_per_bar(3)
            .push_frames(std::iter::repeat([0u8; 16]).take(4))
            .build();
        assert_eq!(data.len(), HEADER_LEN + 4 * REGISTERS_PER_FRAME);

        let module = parse_module(&data).unwrap();
        assert_eq!(module.header.frame_rate, 60);
        assert_eq!(module.header.frame_count, 4);
        assert_eq!(module.header.loop_frame, 2);
        assert_eq!(module.header.tempo_bpm, 140.0);
        assert_eq!(module.header.beats_per_bar, 3);
        assert_eq!(module.frames.len(), 4);
    }

    #[test]
    fn test_reject_bad_magic() {
        let mut data = PsgDumpBuilder::new().push_frame([0; 16]).build();
        data[0] = b'X';
        let err = parse_module(&data).unwrap_err();
        assert!(err.to_string().contains("invalid magic"));
    }

    #[test]
    fn test_reject_truncated_frames() {
        let mut data = PsgDumpBuilder::new()
            .push_frame([0; 16])
            .push_frame([0; 16])
            .build();
        data.truncate(data.len() - 1);
        let err = parse_module(&data).unwrap_err();
        assert!(err.to_string().contains("frames"));
    }

    #[test]
    fn test_reject_short_header() {
        assert!(parse_module(b"PSGD\x00\x01").is_err());
        assert!(parse_module(&[]).is_err());
    }

    #[test]
    fn test_reject_empty_sequence() {
        let data = PsgDumpBuilder::new().build();
        assert!(parse_module(&data).is_err());
    }

    #[test]
    fn test_out_of_range_loop_frame_resets() {
        let data = PsgDumpBuilder::new()
            .loop_frame(9)
            .push_frame([0; 16])
            .build();
        assert_eq!(parse_module(&data).unwrap().header.loop_frame, 0);
    }
}
