//! Capture session
//!
//! Ties synchronizer, decoder and sequence tracker into a single-threaded
//! pull loop. Rejected frames are counted and followed by a resync; only
//! source failures and an initial lock timeout end the session with `Err`.

use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::cancel::CancelToken;
use crate::config::CaptureConfig;
use crate::decoder::{decode_blob, FrameDecoder};
use crate::errors::{CaptureError, FrameError, Result, SourceError};
use crate::format::FrameFormat;
use crate::frame::DecodedFrame;
use crate::sequence::SequenceTracker;
use crate::source::{BlobSource, ByteSource};
use crate::summary::{EndReason, SessionStats, SessionSummary};
use crate::sync::Synchronizer;

/// Receives every validated frame, in arrival order
pub trait FrameConsumer {
    fn on_frame(&mut self, frame: &DecodedFrame, gap_detected: bool);
}

impl<F> FrameConsumer for F
where
    F: FnMut(&DecodedFrame, bool),
{
    fn on_frame(&mut self, frame: &DecodedFrame, gap_detected: bool) {
        self(frame, gap_detected)
    }
}

/// Collects owned copies, mostly for tests and short captures
impl FrameConsumer for Vec<(DecodedFrame, bool)> {
    fn on_frame(&mut self, frame: &DecodedFrame, gap_detected: bool) {
        self.push((frame.clone(), gap_detected));
    }
}

/// Per-run state; created fresh by every `run_*` call
struct RunState {
    started: Instant,
    tracker: SequenceTracker,
    stats: SessionStats,
    stalls: u32,
}

impl RunState {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            tracker: SequenceTracker::new(),
            stats: SessionStats::new(),
            stalls: 0,
        }
    }

    fn deliver<C: FrameConsumer + ?Sized>(&mut self, frame: &DecodedFrame, consumer: &mut C) {
        self.stalls = 0;
        let gap = frame
            .sequence_number
            .map_or(false, |seq| self.tracker.observe(seq));
        self.stats.record_frame(frame, gap);
        consumer.on_frame(frame, gap);
    }
}

pub struct CaptureSession {
    format: FrameFormat,
    config: CaptureConfig,
    cancel: CancelToken,
}

impl CaptureSession {
    pub fn new(format: FrameFormat, config: CaptureConfig) -> Result<Self> {
        format.validate()?;
        Ok(Self {
            format,
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Share an externally owned token (e.g. one wired to Ctrl-C)
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn should_stop(&self, run: &RunState) -> Option<EndReason> {
        if self.cancel.is_cancelled() {
            return Some(EndReason::Cancelled);
        }
        match self.config.get_duration() {
            Some(limit) if run.started.elapsed() >= limit => Some(EndReason::Completed),
            _ => None,
        }
    }

    fn stalled(&self, run: &mut RunState) -> bool {
        run.stalls += 1;
        run.stalls >= self.config.get_max_consecutive_stalls()
    }

    fn finish(&self, run: RunState, end_reason: EndReason) -> SessionSummary {
        let summary = SessionSummary {
            format_name: self.format.name.to_string(),
            stats: run.stats,
            elapsed_ms: run.started.elapsed().as_millis() as u64,
            end_reason,
            aux_clock_hz: self.format.aux_clock_hz,
        };
        info!(
            format = self.format.name,
            reason = ?end_reason,
            frames = summary.stats.frames,
            rejected = summary.stats.rejected_frames(),
            gaps = summary.stats.sequence_gaps,
            "capture finished"
        );
        summary
    }

    /// Capture from a streaming source until a stop condition.
    pub fn run_stream<S, C>(&self, source: &mut S, consumer: &mut C) -> Result<SessionSummary>
    where
        S: ByteSource + ?Sized,
        C: FrameConsumer + ?Sized,
    {
        if !self.format.supports_streaming() {
            return Err(CaptureError::InvalidFormat(format!(
                "{} has no marker and can only be captured as blobs",
                self.format.name
            )));
        }

        let mut run = RunState::new();
        let mut sync = Synchronizer::new(&self.format);
        let mut decoder = FrameDecoder::new(self.format);
        let mut ever_locked = false;
        info!(format = self.format.name, "stream capture started");

        let end_reason = loop {
            if let Some(reason) = self.should_stop(&run) {
                break reason;
            }

            let was_locked = sync.is_locked();
            let timeout = if ever_locked {
                self.config.get_resync_timeout()
            } else {
                self.config.get_initial_lock_timeout()
            };

            let skipped = match sync.acquire(source, timeout) {
                Ok(skipped) => skipped,
                Err(CaptureError::SyncTimeout { window_ms }) if ever_locked => {
                    warn!(window_ms, "marker not re-acquired, ending capture");
                    break EndReason::SyncLost;
                }
                Err(e) => return Err(e),
            };

            if ever_locked && (skipped > 0 || !was_locked) {
                run.stats.record_resync(skipped);
            } else {
                run.stats.bytes_skipped += skipped as u64;
            }
            ever_locked = true;

            match decoder.decode_stream(source, self.config.get_read_timeout()) {
                Ok(frame) => run.deliver(&frame, consumer),
                Err(CaptureError::Frame(err)) => {
                    run.stats.record_rejection(&err);
                    sync.lose_lock();
                    if let FrameError::ShortRead { .. } = err {
                        warn!(%err, stalls = run.stalls + 1, "link stalled mid-frame");
                        if self.stalled(&mut run) {
                            break EndReason::LinkDead;
                        }
                    } else {
                        run.stalls = 0;
                        debug!(%err, "frame rejected, resyncing");
                    }
                }
                Err(e) => return Err(e),
            }
        };

        Ok(self.finish(run, end_reason))
    }

    /// Capture from a blob source until a stop condition.
    ///
    /// Each blob is one candidate frame; nothing is carried between blobs.
    pub fn run_blobs<S, C>(&self, source: &mut S, consumer: &mut C) -> Result<SessionSummary>
    where
        S: BlobSource + ?Sized,
        C: FrameConsumer + ?Sized,
    {
        let mut run = RunState::new();
        let mut sync = Synchronizer::new(&self.format);
        info!(format = self.format.name, "blob capture started");

        let end_reason = loop {
            if let Some(reason) = self.should_stop(&run) {
                break reason;
            }

            let blob = match source.read_blob() {
                Ok(blob) => blob,
                Err(SourceError::Timeout { .. }) => {
                    run.stats.blob_timeouts += 1;
                    warn!(stalls = run.stalls + 1, "no blob before timeout");
                    if self.stalled(&mut run) {
                        break EndReason::LinkDead;
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if blob.is_empty() {
                run.stalls = 0;
                run.stats.empty_blobs += 1;
                trace!("empty blob");
                continue;
            }

            match decode_blob(&self.format, sync.strip_overflow(&blob)) {
                Ok(frame) => {
                    if !sync.is_locked() {
                        debug!(len = blob.len(), "blob framing accepted");
                        sync.mark_locked();
                    }
                    run.deliver(&frame, consumer);
                }
                Err(err) => {
                    run.stalls = 0;
                    run.stats.record_rejection(&err);
                    sync.lose_lock();
                    debug!(%err, len = blob.len(), "blob rejected");
                }
            }
        };

        Ok(self.finish(run, end_reason))
    }
}
