//! Static wire-format descriptors
//!
//! A `FrameFormat` is fixed for the lifetime of a capture session. The
//! built-in descriptors match the sensor sketches this crate talks to;
//! custom ones can be declared as `const` items and are checked by
//! `FrameFormat::validate` before a session starts.

use crate::crc::Crc16;
use crate::errors::{CaptureError, Result};

/// Trailing checksum width in bytes (every supported format uses CRC-16)
pub const CHECKSUM_LEN: usize = 2;

/// Little-endian magic 0xA55A as it appears on the wire
pub const SERIAL_MARKER: [u8; 2] = [0x5A, 0xA5];

/// Byte the RPC bridge may prepend to a blob when its buffer overflowed
pub const RPC_OVERFLOW_PREFIX: u8 = 0x21;

/// STM32U585 core clock, the unit of the extended format's gap counter
pub const STM32U585_CPU_HZ: u32 = 160_000_000;

/// Width of a little-endian unsigned wire field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    U8,
    U16,
    U32,
}

impl FieldWidth {
    pub const fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    pub const fn max_value(self) -> u64 {
        match self {
            Self::U8 => u8::MAX as u64,
            Self::U16 => u16::MAX as u64,
            Self::U32 => u32::MAX as u64,
        }
    }
}

/// Meaning of a header field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Monotonic per-frame counter
    Sequence,
    /// Number of samples in the payload
    SampleCount,
    /// Hardware counter carried alongside the frame (gap cycles)
    AuxCounter,
    /// Absolute timestamp of the sample preceding the first delta
    BaseTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderField {
    pub role: FieldRole,
    pub width: FieldWidth,
}

impl HeaderField {
    pub const fn new(role: FieldRole, width: FieldWidth) -> Self {
        Self { role, width }
    }
}

/// Per-sample payload layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    /// Container width of the sample value
    pub width: FieldWidth,
    /// Whether the container is sign-extended by the firmware
    pub signed: bool,
    /// Optional narrow timestamp delta following each sample
    pub delta: Option<FieldWidth>,
}

/// Which bytes the trailing CRC protects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcCoverage {
    /// Marker, header and payload
    MarkerHeaderPayload,
    /// Everything after the marker up to the checksum
    HeaderPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub name: &'static str,
    /// Wire-order marker; empty for blob-only formats
    pub marker: &'static [u8],
    /// Single byte stripped from the front of a blob when present
    pub overflow_prefix: Option<u8>,
    pub header: &'static [HeaderField],
    pub sample: SampleLayout,
    /// True sensor resolution; `None` keeps the decoded container value
    pub bit_depth: Option<u8>,
    pub crc: Crc16,
    pub crc_coverage: CrcCoverage,
    pub max_samples: u16,
    /// Tick rate of the aux counter, when it measures time
    pub aux_clock_hz: Option<u32>,
}

/// Serial sketch v3: marker, seq u32, count u16, i16 samples, CCITT CRC.
pub const MINIMAL: FrameFormat = FrameFormat {
    name: "minimal",
    marker: &SERIAL_MARKER,
    overflow_prefix: None,
    header: &[
        HeaderField::new(FieldRole::Sequence, FieldWidth::U32),
        HeaderField::new(FieldRole::SampleCount, FieldWidth::U16),
    ],
    sample: SampleLayout { width: FieldWidth::U16, signed: true, delta: None },
    bit_depth: Some(12),
    crc: Crc16::CcittFalse,
    crc_coverage: CrcCoverage::MarkerHeaderPayload,
    max_samples: 512,
    aux_clock_hz: None,
};

/// Serial sketch v4: adds a gap-cycle counter after the sample count.
pub const EXTENDED: FrameFormat = FrameFormat {
    name: "extended",
    marker: &SERIAL_MARKER,
    overflow_prefix: None,
    header: &[
        HeaderField::new(FieldRole::Sequence, FieldWidth::U32),
        HeaderField::new(FieldRole::SampleCount, FieldWidth::U16),
        HeaderField::new(FieldRole::AuxCounter, FieldWidth::U32),
    ],
    sample: SampleLayout { width: FieldWidth::U16, signed: true, delta: None },
    bit_depth: Some(12),
    crc: Crc16::CcittFalse,
    crc_coverage: CrcCoverage::MarkerHeaderPayload,
    max_samples: 16384,
    aux_clock_hz: Some(STM32U585_CPU_HZ),
};

/// RPC ECG frame: count u8, base timestamp u32, then (u16 sample, u8 delta)
/// pairs. No marker; framing relies on exact length and CRC.
pub const INTERLEAVED: FrameFormat = FrameFormat {
    name: "interleaved",
    marker: &[],
    overflow_prefix: Some(RPC_OVERFLOW_PREFIX),
    header: &[
        HeaderField::new(FieldRole::SampleCount, FieldWidth::U8),
        HeaderField::new(FieldRole::BaseTimestamp, FieldWidth::U32),
    ],
    sample: SampleLayout { width: FieldWidth::U16, signed: false, delta: Some(FieldWidth::U8) },
    bit_depth: None,
    crc: Crc16::Ibm,
    crc_coverage: CrcCoverage::HeaderPayload,
    max_samples: 255,
    aux_clock_hz: None,
};

/// RPC ADC frame: count u16, seq u32, 14-bit samples in u16 containers.
pub const RPC_SEQUENCED: FrameFormat = FrameFormat {
    name: "rpc-sequenced",
    marker: &[],
    overflow_prefix: Some(RPC_OVERFLOW_PREFIX),
    header: &[
        HeaderField::new(FieldRole::SampleCount, FieldWidth::U16),
        HeaderField::new(FieldRole::Sequence, FieldWidth::U32),
    ],
    sample: SampleLayout { width: FieldWidth::U16, signed: false, delta: None },
    bit_depth: Some(14),
    crc: Crc16::Ibm,
    crc_coverage: CrcCoverage::HeaderPayload,
    max_samples: 16384,
    aux_clock_hz: None,
};

/// Every format shipped with the crate
pub const BUILTIN_FORMATS: [FrameFormat; 4] = [MINIMAL, EXTENDED, INTERLEAVED, RPC_SEQUENCED];

impl FrameFormat {
    /// Look up a built-in format by name
    pub fn by_name(name: &str) -> Option<FrameFormat> {
        BUILTIN_FORMATS.iter().copied().find(|f| f.name == name)
    }

    pub fn header_len(&self) -> usize {
        self.header.iter().map(|field| field.width.bytes()).sum()
    }

    /// Byte offset (relative to the header start) and width of a field
    pub fn field(&self, role: FieldRole) -> Option<(usize, FieldWidth)> {
        let mut offset = 0;
        for field in self.header {
            if field.role == role {
                return Some((offset, field.width));
            }
            offset += field.width.bytes();
        }
        None
    }

    pub fn has_field(&self, role: FieldRole) -> bool {
        self.field(role).is_some()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.sample.width.bytes() + self.sample.delta.map_or(0, FieldWidth::bytes)
    }

    pub fn payload_len(&self, sample_count: usize) -> usize {
        sample_count * self.bytes_per_sample()
    }

    /// Marker + header + payload + checksum
    pub fn frame_len(&self, sample_count: usize) -> usize {
        self.marker.len() + self.header_len() + self.payload_len(sample_count) + CHECKSUM_LEN
    }

    pub fn max_frame_len(&self) -> usize {
        self.frame_len(self.max_samples as usize)
    }

    /// Mask recovering the sensor's true resolution
    pub fn sample_mask(&self) -> Option<u32> {
        self.bit_depth.map(|bits| {
            if bits >= 32 {
                u32::MAX
            } else {
                (1u32 << bits) - 1
            }
        })
    }

    /// Streaming decode needs a marker to scan for
    pub fn supports_streaming(&self) -> bool {
        !self.marker.is_empty()
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CaptureError::InvalidFormat(format!("{}: {}", self.name, msg)));

        for role in [
            FieldRole::Sequence,
            FieldRole::SampleCount,
            FieldRole::AuxCounter,
            FieldRole::BaseTimestamp,
        ] {
            let occurrences = self.header.iter().filter(|f| f.role == role).count();
            if occurrences > 1 {
                return invalid(format!("header field {:?} declared {} times", role, occurrences));
            }
        }

        let Some((_, count_width)) = self.field(FieldRole::SampleCount) else {
            return invalid("header has no sample count field".to_string());
        };

        if self.max_samples == 0 {
            return invalid("max_samples must be at least 1".to_string());
        }

        if self.max_samples as u64 > count_width.max_value() {
            return invalid(format!(
                "max_samples {} does not fit the {}-byte count field",
                self.max_samples,
                count_width.bytes()
            ));
        }

        if self.sample.delta.is_some() && !self.has_field(FieldRole::BaseTimestamp) {
            return invalid("per-sample deltas require a base timestamp field".to_string());
        }

        if let Some(bits) = self.bit_depth {
            let container_bits = self.sample.width.bytes() * 8;
            if bits == 0 || bits as usize > container_bits {
                return invalid(format!(
                    "bit depth {} does not fit a {}-bit sample",
                    bits, container_bits
                ));
            }
        }

        if self.marker.is_empty() && self.overflow_prefix.is_none() && self.header.is_empty() {
            return invalid("format has neither marker nor header".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_formats_validate() {
        for format in BUILTIN_FORMATS {
            assert!(format.validate().is_ok(), "{} failed validation", format.name);
        }
    }

    #[test]
    fn test_frame_lengths() {
        assert_eq!(MINIMAL.header_len(), 6);
        assert_eq!(MINIMAL.frame_len(512), 2 + 6 + 1024 + 2);

        assert_eq!(EXTENDED.header_len(), 10);
        assert_eq!(EXTENDED.frame_len(1), 2 + 10 + 2 + 2);

        assert_eq!(INTERLEAVED.bytes_per_sample(), 3);
        assert_eq!(INTERLEAVED.frame_len(4), 1 + 4 + 12 + 2);

        assert_eq!(RPC_SEQUENCED.frame_len(0), 8);
    }

    #[test]
    fn test_field_offsets() {
        assert_eq!(EXTENDED.field(FieldRole::Sequence), Some((0, FieldWidth::U32)));
        assert_eq!(EXTENDED.field(FieldRole::SampleCount), Some((4, FieldWidth::U16)));
        assert_eq!(EXTENDED.field(FieldRole::AuxCounter), Some((6, FieldWidth::U32)));
        assert_eq!(RPC_SEQUENCED.field(FieldRole::Sequence), Some((2, FieldWidth::U32)));
        assert_eq!(INTERLEAVED.field(FieldRole::Sequence), None);
    }

    #[test]
    fn test_sample_masks() {
        assert_eq!(MINIMAL.sample_mask(), Some(0x0FFF));
        assert_eq!(RPC_SEQUENCED.sample_mask(), Some(0x3FFF));
        assert_eq!(INTERLEAVED.sample_mask(), None);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(FrameFormat::by_name("extended"), Some(EXTENDED));
        assert_eq!(FrameFormat::by_name("nope"), None);
    }

    #[test]
    fn test_validate_rejects_inconsistent_formats() {
        const SEQUENCE_ONLY: &[HeaderField] = &[HeaderField::new(FieldRole::Sequence, FieldWidth::U32)];
        let no_count = FrameFormat {
            header: SEQUENCE_ONLY,
            ..MINIMAL
        };
        assert!(no_count.validate().is_err());

        let count_too_narrow = FrameFormat { max_samples: 300, ..INTERLEAVED };
        assert!(count_too_narrow.validate().is_err());

        let deltas_without_base = FrameFormat {
            sample: SampleLayout { width: FieldWidth::U16, signed: false, delta: Some(FieldWidth::U8) },
            ..MINIMAL
        };
        assert!(deltas_without_base.validate().is_err());

        let too_deep = FrameFormat { bit_depth: Some(17), ..MINIMAL };
        assert!(too_deep.validate().is_err());

        let zero_max = FrameFormat { max_samples: 0, ..MINIMAL };
        assert!(zero_max.validate().is_err());
    }
}
