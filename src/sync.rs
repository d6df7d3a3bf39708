//! Frame synchronizer
//!
//! Streaming mode scans byte by byte for the format's marker and leaves
//! the cursor right after it. Blob mode never scans: a blob is already
//! delimited, so only the optional overflow prefix is stripped.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::errors::{CaptureError, Result, SourceError};
use crate::format::FrameFormat;
use crate::source::ByteSource;

/// Whether the byte cursor is known to sit on a frame boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Searching,
    Locked,
}

pub struct Synchronizer {
    marker: &'static [u8],
    overflow_prefix: Option<u8>,
    state: SyncState,
    window: Vec<u8>,
}

impl Synchronizer {
    pub fn new(format: &FrameFormat) -> Self {
        Self {
            marker: format.marker,
            overflow_prefix: format.overflow_prefix,
            state: SyncState::Searching,
            window: Vec::with_capacity(format.marker.len()),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == SyncState::Locked
    }

    /// Drop lock after a rejected frame; the next `acquire` scans from the
    /// next unread byte.
    pub fn lose_lock(&mut self) {
        if self.state == SyncState::Locked {
            debug!("sync lost, searching");
        }
        self.state = SyncState::Searching;
    }

    /// Record that a blob was accepted as a whole frame
    pub fn mark_locked(&mut self) {
        self.state = SyncState::Locked;
    }

    /// Scan `source` until the marker has been consumed.
    ///
    /// Returns the number of bytes discarded before the marker. Fails with
    /// `SyncTimeout` if `timeout` elapses first; fatal source errors pass
    /// through.
    pub fn acquire<S: ByteSource + ?Sized>(&mut self, source: &mut S, timeout: Duration) -> Result<usize> {
        if self.marker.is_empty() {
            return Ok(0);
        }

        let was_locked = self.is_locked();
        let started = Instant::now();
        let deadline = started + timeout;
        let mut skipped = 0usize;
        let mut byte = [0u8; 1];
        self.window.clear();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(timeout, started, skipped));
            }

            match source.read_exact(&mut byte, remaining) {
                Ok(()) => {}
                Err(SourceError::Timeout { .. }) => return Err(self.timed_out(timeout, started, skipped)),
                Err(e) => return Err(e.into()),
            }

            if self.window.len() == self.marker.len() {
                self.window.remove(0);
                skipped += 1;
                if skipped == 1 && self.state == SyncState::Locked {
                    warn!("expected frame marker missing, lock lost");
                    self.state = SyncState::Searching;
                }
            }
            self.window.push(byte[0]);

            if self.window == self.marker {
                if !was_locked || skipped > 0 {
                    info!(skipped, "frame marker locked");
                }
                self.state = SyncState::Locked;
                return Ok(skipped);
            }
        }
    }

    /// The error names the configured window; the log line carries the time
    /// actually spent, which is shorter when the source gave up early.
    fn timed_out(&mut self, timeout: Duration, started: Instant, skipped: usize) -> CaptureError {
        self.state = SyncState::Searching;
        warn!(
            skipped,
            window_ms = timeout.as_millis() as u64,
            waited_ms = started.elapsed().as_millis() as u64,
            "no frame marker before timeout"
        );
        CaptureError::SyncTimeout { window_ms: timeout.as_millis() as u64 }
    }

    /// Strip the overflow prefix from a blob when it is present
    pub fn strip_overflow<'a>(&self, blob: &'a [u8]) -> &'a [u8] {
        match (self.overflow_prefix, blob.split_first()) {
            (Some(prefix), Some((&first, rest))) if first == prefix && !rest.is_empty() => rest,
            _ => blob,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{INTERLEAVED, MINIMAL};
    use crate::source::ReaderSource;
    use std::io::Cursor;

    fn source(bytes: &[u8]) -> ReaderSource<Cursor<Vec<u8>>> {
        ReaderSource::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn test_locks_on_marker_after_garbage() {
        let mut sync = Synchronizer::new(&MINIMAL);
        let mut src = source(&[0x00, 0x5A, 0x13, 0xA5, 0x5A, 0xA5, 0x77]);

        let skipped = sync.acquire(&mut src, Duration::from_millis(50)).unwrap();
        assert_eq!(skipped, 4);
        assert!(sync.is_locked());

        // Cursor sits right after the marker
        let mut next = [0u8; 1];
        src.read_exact(&mut next, Duration::from_millis(10)).unwrap();
        assert_eq!(next, [0x77]);
    }

    #[test]
    fn test_marker_at_start_skips_nothing() {
        let mut sync = Synchronizer::new(&MINIMAL);
        let mut src = source(&[0x5A, 0xA5]);
        assert_eq!(sync.acquire(&mut src, Duration::from_millis(50)).unwrap(), 0);
    }

    #[test]
    fn test_timeout_without_marker() {
        let mut sync = Synchronizer::new(&MINIMAL);
        let mut src = source(&[0xA5, 0x5A, 0x00]);

        let err = sync.acquire(&mut src, Duration::from_millis(50)).unwrap_err();
        assert_eq!(err, CaptureError::SyncTimeout { window_ms: 50 });
        assert_eq!(sync.state(), SyncState::Searching);
    }

    #[test]
    fn test_early_source_timeout_reports_window() {
        let mut sync = Synchronizer::new(&MINIMAL);
        let mut src = source(&[0x01]);
        let start = Instant::now();

        let err = sync.acquire(&mut src, Duration::from_millis(500)).unwrap_err();
        assert_eq!(err, CaptureError::SyncTimeout { window_ms: 500 });
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_missing_marker_while_locked_drops_lock_then_relocks() {
        let mut sync = Synchronizer::new(&MINIMAL);
        let mut src = source(&[0x5A, 0xA5, 0x01, 0x02, 0x5A, 0xA5]);

        sync.acquire(&mut src, Duration::from_millis(50)).unwrap();
        assert!(sync.is_locked());

        let skipped = sync.acquire(&mut src, Duration::from_millis(50)).unwrap();
        assert_eq!(skipped, 2);
        assert!(sync.is_locked());
    }

    #[test]
    fn test_lose_lock() {
        let mut sync = Synchronizer::new(&MINIMAL);
        sync.mark_locked();
        sync.lose_lock();
        assert_eq!(sync.state(), SyncState::Searching);
    }

    #[test]
    fn test_strip_overflow_prefix() {
        let sync = Synchronizer::new(&INTERLEAVED);
        assert_eq!(sync.strip_overflow(&[0x21, 0x01, 0x02]), &[0x01, 0x02]);
        assert_eq!(sync.strip_overflow(&[0x01, 0x21]), &[0x01, 0x21]);
        assert_eq!(sync.strip_overflow(&[0x21]), &[0x21]);
        assert!(sync.strip_overflow(&[]).is_empty());

        // Formats without a prefix leave blobs untouched
        let plain = Synchronizer::new(&MINIMAL);
        assert_eq!(plain.strip_overflow(&[0x21, 0x01]), &[0x21, 0x01]);
    }
}
