/// Frame decoder
///
/// Turns the bytes following a confirmed marker (streaming) or a whole
/// prefix-stripped blob into a `DecodedFrame`. Validation order:
/// header bounds, length, CRC, then payload decode. A rejected frame is
/// never retried; the caller resyncs.
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use crate::errors::{FrameError, Result};
use crate::format::{CrcCoverage, FieldRole, FieldWidth, FrameFormat};
use crate::frame::{DecodedFrame, RawFrame};
use crate::source::ByteSource;

/// Header fields after little-endian decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    pub sequence: Option<u32>,
    pub sample_count: u32,
    pub aux_counter: Option<u32>,
    pub base_timestamp: Option<u32>,
}

#[inline]
fn read_field(bytes: &[u8], width: FieldWidth) -> u32 {
    match width {
        FieldWidth::U8 => bytes[0] as u32,
        FieldWidth::U16 => LittleEndian::read_u16(bytes) as u32,
        FieldWidth::U32 => LittleEndian::read_u32(bytes),
    }
}

/// Parse and bound-check the fixed header.
///
/// `header` must be exactly `format.header_len()` bytes, otherwise
/// `LengthMismatch`.
pub fn parse_header(format: &FrameFormat, header: &[u8]) -> std::result::Result<FrameHeader, FrameError> {
    if header.len() != format.header_len() {
        return Err(FrameError::LengthMismatch { expected: format.header_len(), actual: header.len() });
    }

    let mut parsed = FrameHeader::default();
    let mut off = 0;

    for field in format.header {
        let value = read_field(&header[off..off + field.width.bytes()], field.width);
        off += field.width.bytes();

        match field.role {
            FieldRole::Sequence => parsed.sequence = Some(value),
            FieldRole::SampleCount => parsed.sample_count = value,
            FieldRole::AuxCounter => parsed.aux_counter = Some(value),
            FieldRole::BaseTimestamp => parsed.base_timestamp = Some(value),
        }
    }

    if parsed.sample_count == 0 || parsed.sample_count > format.max_samples as u32 {
        return Err(FrameError::MalformedHeader {
            sample_count: parsed.sample_count,
            max_samples: format.max_samples,
        });
    }

    Ok(parsed)
}

/// CRC over the span the format declares as covered
pub fn covered_checksum(format: &FrameFormat, raw: &RawFrame<'_>) -> u16 {
    let mut crc = format.crc.start();
    if format.crc_coverage == CrcCoverage::MarkerHeaderPayload {
        crc.update(raw.marker);
    }
    crc.update(raw.header);
    crc.update(raw.payload);
    crc.finish()
}

#[inline]
fn read_sample(bytes: &[u8], width: FieldWidth, signed: bool) -> i64 {
    match (width, signed) {
        (FieldWidth::U8, false) => bytes[0] as i64,
        (FieldWidth::U8, true) => bytes[0] as i8 as i64,
        (FieldWidth::U16, false) => LittleEndian::read_u16(bytes) as i64,
        (FieldWidth::U16, true) => LittleEndian::read_i16(bytes) as i64,
        (FieldWidth::U32, false) => LittleEndian::read_u32(bytes) as i64,
        (FieldWidth::U32, true) => LittleEndian::read_i32(bytes) as i64,
    }
}

/// Validate the CRC of a split frame and decode its payload
pub fn validate_frame(
    format: &FrameFormat,
    raw: &RawFrame<'_>,
    header: FrameHeader,
) -> std::result::Result<DecodedFrame, FrameError> {
    let transmitted = raw.transmitted_checksum();
    let computed = covered_checksum(format, raw);
    if transmitted != computed {
        return Err(FrameError::ChecksumMismatch { expected: transmitted, computed });
    }

    let count = header.sample_count as usize;
    let width = format.sample.width;
    let mask = format.sample_mask().map(i64::from);

    let mut samples = Vec::with_capacity(count);
    let mut timestamps = format.sample.delta.map(|_| Vec::with_capacity(count));
    let mut clock = header.base_timestamp.unwrap_or(0) as u64;

    for element in raw.payload.chunks_exact(format.bytes_per_sample()) {
        let value = read_sample(element, width, format.sample.signed);
        // Firmware sign-extends or pads; only the low bits are the reading
        let value = match mask {
            Some(mask) => value & mask,
            None => value,
        };
        samples.push(value as i32);

        if let (Some(delta_width), Some(timestamps)) = (format.sample.delta, timestamps.as_mut()) {
            clock += read_field(&element[width.bytes()..], delta_width) as u64;
            timestamps.push(clock);
        }
    }

    Ok(DecodedFrame {
        sequence_number: header.sequence,
        sample_count: count as u16,
        aux_counter: header.aux_counter,
        base_timestamp: header.base_timestamp,
        samples,
        timestamps,
    })
}

/// Decode a complete blob (overflow prefix already stripped)
pub fn decode_blob(format: &FrameFormat, blob: &[u8]) -> std::result::Result<DecodedFrame, FrameError> {
    let fixed = format.marker.len() + format.header_len();
    if blob.len() < fixed {
        return Err(FrameError::LengthMismatch { expected: format.frame_len(1), actual: blob.len() });
    }
    if !blob.starts_with(format.marker) {
        return Err(FrameError::MissingMarker);
    }

    let header = parse_header(format, &blob[format.marker.len()..fixed])?;
    let count = header.sample_count as usize;
    let expected = format.frame_len(count);

    let raw = RawFrame::split(format, blob, count)
        .ok_or(FrameError::LengthMismatch { expected, actual: blob.len() })?;

    validate_frame(format, &raw, header)
}

/// Streaming decoder with a reusable frame buffer
pub struct FrameDecoder {
    format: FrameFormat,
    scratch: Vec<u8>,
}

impl FrameDecoder {
    pub fn new(format: FrameFormat) -> Self {
        Self {
            scratch: Vec::with_capacity(format.max_frame_len()),
            format,
        }
    }

    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Decode one frame; the marker has just been consumed from `source`.
    ///
    /// Each `read_exact` is bounded by `timeout`. A count outside
    /// `[1, max_samples]` fails before any payload byte is read.
    pub fn decode_stream<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        timeout: Duration,
    ) -> Result<DecodedFrame> {
        let format = &self.format;
        let marker_len = format.marker.len();
        let fixed = marker_len + format.header_len();

        self.scratch.clear();
        self.scratch.extend_from_slice(format.marker);
        self.scratch.resize(fixed, 0);
        source.read_exact(&mut self.scratch[marker_len..fixed], timeout)?;

        let header = parse_header(format, &self.scratch[marker_len..fixed])?;
        let count = header.sample_count as usize;
        let total = format.frame_len(count);
        trace!(count, total, "header accepted");

        self.scratch.resize(total, 0);
        source.read_exact(&mut self.scratch[fixed..total], timeout)?;

        let raw = RawFrame::split(format, &self.scratch, count)
            .ok_or(FrameError::LengthMismatch { expected: total, actual: self.scratch.len() })?;

        Ok(validate_frame(format, &raw, header)?)
    }
}
