/// Session counters and the end-of-capture summary
///
/// `SessionStats` is owned by the decode loop and threaded through it;
/// `SessionSummary` is what the caller gets back. The summary archives
/// with rkyv so a capture's fidelity record can be stored next to its data.
use std::fmt;
use std::time::Duration;

use rkyv::{AlignedVec, Archive, Deserialize, Serialize};

use crate::errors::{CaptureError, FrameError, Result};
use crate::frame::DecodedFrame;

/// Why a session stopped
#[derive(Archive, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[archive(check_bytes)]
pub enum EndReason {
    /// Wall-clock duration elapsed
    Completed,
    /// Cancel token fired
    Cancelled,
    /// Resync window elapsed without a marker after data had flowed
    SyncLost,
    /// Too many consecutive stalls
    LinkDead,
}

#[derive(Archive, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct SessionStats {
    pub frames: u64,
    pub samples: u64,
    pub checksum_failures: u64,
    pub malformed_headers: u64,
    pub missing_markers: u64,
    pub length_mismatches: u64,
    pub short_reads: u64,
    pub sequence_gaps: u64,
    pub resyncs: u64,
    pub bytes_skipped: u64,
    pub empty_blobs: u64,
    pub blob_timeouts: u64,
    /// Sum of every accepted frame's aux counter
    pub aux_total: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, frame: &DecodedFrame, gap_detected: bool) {
        self.frames += 1;
        self.samples += frame.samples.len() as u64;
        if gap_detected {
            self.sequence_gaps += 1;
        }
        if let Some(aux) = frame.aux_counter {
            self.aux_total += aux as u64;
        }
    }

    pub fn record_rejection(&mut self, err: &FrameError) {
        match err {
            FrameError::MalformedHeader { .. } => self.malformed_headers += 1,
            FrameError::MissingMarker => self.missing_markers += 1,
            FrameError::LengthMismatch { .. } => self.length_mismatches += 1,
            FrameError::ChecksumMismatch { .. } => self.checksum_failures += 1,
            FrameError::ShortRead { .. } => self.short_reads += 1,
        }
    }

    pub fn record_resync(&mut self, bytes_skipped: usize) {
        self.resyncs += 1;
        self.bytes_skipped += bytes_skipped as u64;
    }

    /// Every candidate frame that failed validation
    pub fn rejected_frames(&self) -> u64 {
        self.checksum_failures
            + self.malformed_headers
            + self.missing_markers
            + self.length_mismatches
            + self.short_reads
    }
}

#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[archive(check_bytes)]
pub struct SessionSummary {
    pub format_name: String,
    pub stats: SessionStats,
    pub elapsed_ms: u64,
    pub end_reason: EndReason,
    /// Tick rate of the aux counter, when the format's counter measures time
    pub aux_clock_hz: Option<u32>,
}

impl SessionSummary {
    /// Accumulated inter-frame gap time, for formats that carry timing
    pub fn gap_duration(&self) -> Option<Duration> {
        self.aux_clock_hz
            .filter(|hz| *hz > 0)
            .map(|hz| {
                let nanos = self.stats.aux_total as u128 * 1_000_000_000 / hz as u128;
                Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
            })
    }

    pub fn sample_rate(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.stats.samples as f64 * 1000.0 / self.elapsed_ms as f64
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rkyv::to_bytes::<_, 256>(self)
            .map(|aligned_vec| aligned_vec.to_vec())
            .map_err(|_| CaptureError::Encode("Failed to serialize session summary".to_string()))
    }

    /// Validate and restore an archived summary
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut aligned = AlignedVec::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<SessionSummary>(&aligned)
            .map_err(|_| CaptureError::Encode("Archived session summary failed validation".to_string()))
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "CAPTURE SUMMARY ({}):", self.format_name)?;
        writeln!(f, "  Ended: {:?} after {} ms", self.end_reason, self.elapsed_ms)?;
        writeln!(f, "  Frames: {} | Samples: {} | Rate: {:.0} Sa/s", stats.frames, stats.samples, self.sample_rate())?;
        writeln!(
            f,
            "  CRC err: {} | Malformed: {} | Short reads: {} | Length err: {} | No marker: {}",
            stats.checksum_failures,
            stats.malformed_headers,
            stats.short_reads,
            stats.length_mismatches,
            stats.missing_markers
        )?;
        writeln!(
            f,
            "  Seq gaps: {} | Resyncs: {} | Skipped bytes: {} | Empty blobs: {} | Blob timeouts: {}",
            stats.sequence_gaps, stats.resyncs, stats.bytes_skipped, stats.empty_blobs, stats.blob_timeouts
        )?;
        if let Some(gap) = self.gap_duration() {
            writeln!(f, "  Total gap: {:.1} us across all frames", gap.as_secs_f64() * 1e6)?;
        }
        Ok(())
    }
}
