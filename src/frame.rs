/// Frame data structures
///
/// `RawFrame` is a borrowed view over one candidate frame and lives only
/// while that frame is being validated. `DecodedFrame` is what the consumer
/// receives once every check has passed.
use byteorder::{ByteOrder, LittleEndian};

use crate::format::{FrameFormat, CHECKSUM_LEN};

/// Validated, decoded frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedFrame {
    /// Per-frame counter; `None` for formats that carry no sequence field
    pub sequence_number: Option<u32>,

    /// Number of samples; always equals `samples.len()`
    pub sample_count: u16,

    /// Auxiliary hardware counter (gap cycles on the extended format)
    pub aux_counter: Option<u32>,

    /// Base timestamp for delta-timestamped formats
    pub base_timestamp: Option<u32>,

    /// Sample values after bit-depth masking
    pub samples: Vec<i32>,

    /// Absolute per-sample timestamps reconstructed from deltas
    pub timestamps: Option<Vec<u64>>,
}

impl DecodedFrame {
    pub fn new(samples: Vec<i32>) -> Self {
        Self {
            sample_count: samples.len().min(u16::MAX as usize) as u16,
            samples,
            ..Self::default()
        }
    }

    pub fn with_sequence(mut self, sequence_number: u32) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn with_aux_counter(mut self, aux_counter: u32) -> Self {
        self.aux_counter = Some(aux_counter);
        self
    }

    pub fn with_timestamps(mut self, base_timestamp: u32, timestamps: Vec<u64>) -> Self {
        self.base_timestamp = Some(base_timestamp);
        self.timestamps = Some(timestamps);
        self
    }

    /// Pairs each sample with its absolute timestamp, if the format has them
    pub fn timed_samples(&self) -> Option<impl Iterator<Item = (u64, i32)> + '_> {
        self.timestamps
            .as_ref()
            .map(|ts| ts.iter().copied().zip(self.samples.iter().copied()))
    }
}

/// Borrowed byte ranges of one candidate frame
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub marker: &'a [u8],
    pub header: &'a [u8],
    pub payload: &'a [u8],
    pub checksum: &'a [u8],
}

impl<'a> RawFrame<'a> {
    /// Split a complete frame (marker through checksum) along `format`.
    ///
    /// Returns `None` unless `bytes` is exactly `format.frame_len(sample_count)`.
    pub fn split(format: &FrameFormat, bytes: &'a [u8], sample_count: usize) -> Option<Self> {
        if bytes.len() != format.frame_len(sample_count) {
            return None;
        }

        let (marker, rest) = bytes.split_at(format.marker.len());
        let (header, rest) = rest.split_at(format.header_len());
        let (payload, checksum) = rest.split_at(rest.len() - CHECKSUM_LEN);

        Some(Self { marker, header, payload, checksum })
    }

    pub fn transmitted_checksum(&self) -> u16 {
        LittleEndian::read_u16(self.checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{EXTENDED, INTERLEAVED};

    #[test]
    fn test_builder_sets_count() {
        let frame = DecodedFrame::new(vec![1, 2, 3]).with_sequence(7).with_aux_counter(99);
        assert_eq!(frame.sample_count, 3);
        assert_eq!(frame.sequence_number, Some(7));
        assert_eq!(frame.aux_counter, Some(99));
        assert!(frame.timed_samples().is_none());
    }

    #[test]
    fn test_timed_samples() {
        let frame = DecodedFrame::new(vec![10, 20]).with_timestamps(100, vec![101, 105]);
        let pairs: Vec<_> = frame.timed_samples().unwrap().collect();
        assert_eq!(pairs, vec![(101, 10), (105, 20)]);
    }

    #[test]
    fn test_raw_frame_split() {
        let bytes: Vec<u8> = (0..EXTENDED.frame_len(2) as u8).collect();
        let raw = RawFrame::split(&EXTENDED, &bytes, 2).unwrap();
        assert_eq!(raw.marker, &[0, 1]);
        assert_eq!(raw.header.len(), 10);
        assert_eq!(raw.payload.len(), 4);
        assert_eq!(raw.checksum, &[16, 17]);
        assert_eq!(raw.transmitted_checksum(), 0x1110);

        assert!(RawFrame::split(&EXTENDED, &bytes[..10], 2).is_none());
    }

    #[test]
    fn test_raw_frame_split_without_marker() {
        let bytes = vec![0u8; INTERLEAVED.frame_len(1)];
        let raw = RawFrame::split(&INTERLEAVED, &bytes, 1).unwrap();
        assert!(raw.marker.is_empty());
        assert_eq!(raw.header.len(), 5);
        assert_eq!(raw.payload.len(), 3);
    }
}
