/// Sequence tracker
///
/// A gap means frames were dropped upstream, not that the current frame
/// is bad: the frame is still delivered and the tracker moves on to it.
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct SequenceTracker {
    last_accepted: Option<u32>,
    gaps: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted frame's counter; returns true on a gap.
    pub fn observe(&mut self, sequence: u32) -> bool {
        let gap = match self.last_accepted {
            Some(last) => {
                let expected = last.wrapping_add(1);
                if sequence != expected {
                    debug!(expected, got = sequence, "sequence gap");
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        if gap {
            self.gaps += 1;
        }
        self.last_accepted = Some(sequence);
        gap
    }

    pub fn last_accepted(&self) -> Option<u32> {
        self.last_accepted
    }

    pub fn gaps(&self) -> u64 {
        self.gaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_never_gaps() {
        let mut tracker = SequenceTracker::new();
        assert!(!tracker.observe(12345));
        assert_eq!(tracker.last_accepted(), Some(12345));
    }

    #[test]
    fn test_gap_after_skip() {
        let mut tracker = SequenceTracker::new();
        assert!(!tracker.observe(5));
        assert!(!tracker.observe(6));
        assert_eq!(tracker.gaps(), 0);
        assert!(tracker.observe(8));
        assert_eq!(tracker.gaps(), 1);
    }

    #[test]
    fn test_wraparound_is_contiguous() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(u32::MAX);
        assert!(!tracker.observe(0));
        assert_eq!(tracker.gaps(), 0);
    }

    #[test]
    fn test_state_follows_latest_frame() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(10);
        assert!(tracker.observe(3));
        // Continues from 3, no retroactive catch-up
        assert!(!tracker.observe(4));
        assert_eq!(tracker.gaps(), 1);
        assert_eq!(tracker.last_accepted(), Some(4));
    }
}
