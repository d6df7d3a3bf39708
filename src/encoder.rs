/// Frame encoder - inverse of the decoder
///
/// Produces the exact bytes the sensor firmware would send for a frame.
/// Used for loopback links, replay fixtures and benchmarks.
use crate::errors::{CaptureError, Result};
use crate::format::{CrcCoverage, FieldRole, FieldWidth, FrameFormat};
use crate::frame::DecodedFrame;

fn encode_error<T>(msg: String) -> Result<T> {
    Err(CaptureError::Encode(msg))
}

fn push_field(out: &mut Vec<u8>, value: u64, width: FieldWidth) {
    match width {
        FieldWidth::U8 => out.push(value as u8),
        FieldWidth::U16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
        FieldWidth::U32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
    }
}

fn required(field: Option<u32>, role: FieldRole, format: &FrameFormat) -> Result<u32> {
    match field {
        Some(value) => Ok(value),
        None => encode_error(format!("{} frames require a {:?} value", format.name, role)),
    }
}

/// Range a sample may take before it is written into its container
fn sample_range(format: &FrameFormat) -> (i64, i64) {
    if let Some(mask) = format.sample_mask() {
        return (0, mask as i64);
    }
    let bits = (format.sample.width.bytes() * 8) as u32;
    if format.sample.signed {
        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
    } else {
        (0, (1i64 << bits) - 1)
    }
}

/// Serialize `frame` as marker + header + payload + CRC
pub fn encode_frame(format: &FrameFormat, frame: &DecodedFrame) -> Result<Vec<u8>> {
    let count = frame.samples.len();
    if count != frame.sample_count as usize {
        return encode_error(format!(
            "sample_count {} does not match {} samples",
            frame.sample_count, count
        ));
    }
    if count == 0 || count > format.max_samples as usize {
        return encode_error(format!("sample count {} outside 1..={}", count, format.max_samples));
    }

    let mut out = Vec::with_capacity(format.frame_len(count));
    out.extend_from_slice(format.marker);

    for field in format.header {
        let value = match field.role {
            FieldRole::Sequence => required(frame.sequence_number, field.role, format)?,
            FieldRole::SampleCount => count as u32,
            FieldRole::AuxCounter => required(frame.aux_counter, field.role, format)?,
            FieldRole::BaseTimestamp => required(frame.base_timestamp, field.role, format)?,
        };
        if value as u64 > field.width.max_value() {
            return encode_error(format!("{:?} value {} overflows its field", field.role, value));
        }
        push_field(&mut out, value as u64, field.width);
    }

    let deltas = match format.sample.delta {
        Some(delta_width) => {
            let Some(timestamps) = frame.timestamps.as_ref() else {
                return encode_error(format!("{} frames require timestamps", format.name));
            };
            if timestamps.len() != count {
                return encode_error(format!(
                    "{} timestamps for {} samples",
                    timestamps.len(),
                    count
                ));
            }
            let mut previous = frame.base_timestamp.unwrap_or(0) as u64;
            let mut deltas = Vec::with_capacity(count);
            for &ts in timestamps {
                let delta = ts.checked_sub(previous).filter(|d| *d <= delta_width.max_value());
                let Some(delta) = delta else {
                    return encode_error(format!("timestamp step {} -> {} does not fit a delta", previous, ts));
                };
                deltas.push((delta, delta_width));
                previous = ts;
            }
            Some(deltas)
        }
        None => None,
    };

    let (min, max) = sample_range(format);
    for (i, &sample) in frame.samples.iter().enumerate() {
        let value = sample as i64;
        if value < min || value > max {
            return encode_error(format!("sample {} value {} outside {}..={}", i, value, min, max));
        }
        // Two's complement truncation gives the container's wire bits
        push_field(&mut out, value as u64, format.sample.width);
        if let Some(deltas) = deltas.as_ref() {
            let (delta, width) = deltas[i];
            push_field(&mut out, delta, width);
        }
    }

    let covered = match format.crc_coverage {
        CrcCoverage::MarkerHeaderPayload => &out[..],
        CrcCoverage::HeaderPayload => &out[format.marker.len()..],
    };
    let crc = format.crc.checksum(covered);
    out.extend_from_slice(&crc.to_le_bytes());

    Ok(out)
}

/// Encode for blob delivery, optionally with the bridge's overflow prefix
pub fn encode_blob(format: &FrameFormat, frame: &DecodedFrame, with_overflow_prefix: bool) -> Result<Vec<u8>> {
    let encoded = encode_frame(format, frame)?;
    match (with_overflow_prefix, format.overflow_prefix) {
        (true, Some(prefix)) => {
            let mut blob = Vec::with_capacity(encoded.len() + 1);
            blob.push(prefix);
            blob.extend_from_slice(&encoded);
            Ok(blob)
        }
        (true, None) => encode_error(format!("{} has no overflow prefix", format.name)),
        (false, _) => Ok(encoded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_blob;
    use crate::format::{BUILTIN_FORMATS, EXTENDED, INTERLEAVED, MINIMAL, RPC_SEQUENCED};

    fn sample_frame(format: &FrameFormat) -> DecodedFrame {
        let samples: Vec<i32> = (0..16).map(|i| (i * 97) % 4096).collect();
        let mut frame = DecodedFrame::new(samples);
        if format.has_field(FieldRole::Sequence) {
            frame = frame.with_sequence(0xDEAD_BEEF);
        }
        if format.has_field(FieldRole::AuxCounter) {
            frame = frame.with_aux_counter(48_000);
        }
        if format.sample.delta.is_some() {
            let timestamps = (1..=16).map(|i| 5_000 + i * 3).collect();
            frame = frame.with_timestamps(5_000, timestamps);
        }
        frame
    }

    #[test]
    fn test_round_trip_all_builtin_formats() {
        for format in BUILTIN_FORMATS {
            let frame = sample_frame(&format);
            let bytes = encode_frame(&format, &frame).unwrap();
            assert_eq!(bytes.len(), format.frame_len(16), "{}", format.name);
            assert_eq!(decode_blob(&format, &bytes).unwrap(), frame, "{}", format.name);
        }
    }

    #[test]
    fn test_minimal_wire_layout() {
        let frame = DecodedFrame::new(vec![0x123]).with_sequence(0x0102_0304);
        let bytes = encode_frame(&MINIMAL, &frame).unwrap();
        assert_eq!(&bytes[..10], &[0x5A, 0xA5, 0x04, 0x03, 0x02, 0x01, 0x01, 0x00, 0x23, 0x01]);
        let crc = MINIMAL.crc.checksum(&bytes[..10]);
        assert_eq!(&bytes[10..], &crc.to_le_bytes());
    }

    #[test]
    fn test_rejects_missing_fields() {
        let frame = DecodedFrame::new(vec![1]);
        assert!(matches!(encode_frame(&EXTENDED, &frame), Err(CaptureError::Encode(_))));
        assert!(matches!(encode_frame(&INTERLEAVED, &frame), Err(CaptureError::Encode(_))));
    }

    #[test]
    fn test_rejects_out_of_range_samples() {
        let frame = DecodedFrame::new(vec![0x1000]).with_sequence(1);
        assert!(encode_frame(&MINIMAL, &frame).is_err());

        let frame = DecodedFrame::new(vec![-1]).with_sequence(1);
        assert!(encode_frame(&RPC_SEQUENCED, &frame).is_err());
    }

    #[test]
    fn test_rejects_delta_overflow() {
        let frame = DecodedFrame::new(vec![1, 2]).with_timestamps(0, vec![10, 300]);
        assert!(encode_frame(&INTERLEAVED, &frame).is_err());

        let backwards = DecodedFrame::new(vec![1]).with_timestamps(10, vec![5]);
        assert!(encode_frame(&INTERLEAVED, &backwards).is_err());
    }

    #[test]
    fn test_encode_blob_prefix() {
        let frame = DecodedFrame::new(vec![3]).with_sequence(9);
        let blob = encode_blob(&RPC_SEQUENCED, &frame, true).unwrap();
        assert_eq!(blob[0], 0x21);
        assert_eq!(&blob[1..], &encode_frame(&RPC_SEQUENCED, &frame).unwrap()[..]);

        assert!(encode_blob(&MINIMAL, &frame, true).is_err());
    }
}
