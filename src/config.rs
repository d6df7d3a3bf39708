/// Capture session configuration
///
/// Defaults come from the crate-level constants; every knob can be
/// overridden through the fluent `with_*` methods.
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    initial_lock_timeout: Duration,
    resync_timeout: Duration,
    read_timeout: Duration,
    max_consecutive_stalls: u32,
    duration: Option<Duration>,
}

impl CaptureConfig {
    pub fn new() -> Self {
        Self {
            initial_lock_timeout: Duration::from_millis(crate::DEFAULT_INITIAL_LOCK_TIMEOUT_MS),
            resync_timeout: Duration::from_millis(crate::DEFAULT_RESYNC_TIMEOUT_MS),
            read_timeout: Duration::from_millis(crate::DEFAULT_READ_TIMEOUT_MS),
            max_consecutive_stalls: crate::DEFAULT_MAX_CONSECUTIVE_STALLS,
            duration: None,
        }
    }

    /// Window for the very first marker of the session
    pub fn with_initial_lock_timeout(mut self, timeout: Duration) -> Self {
        self.initial_lock_timeout = timeout;
        self
    }

    /// Window for every re-acquisition after the first lock
    pub fn with_resync_timeout(mut self, timeout: Duration) -> Self {
        self.resync_timeout = timeout;
        self
    }

    /// Bound on each header/payload read inside a frame
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Consecutive mid-frame stalls (or blob timeouts) before the link is declared dead
    pub fn with_max_consecutive_stalls(mut self, stalls: u32) -> Self {
        self.max_consecutive_stalls = stalls.max(1);
        self
    }

    /// Wall-clock bound on the session
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn get_initial_lock_timeout(&self) -> Duration {
        self.initial_lock_timeout
    }

    pub fn get_resync_timeout(&self) -> Duration {
        self.resync_timeout
    }

    pub fn get_read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn get_max_consecutive_stalls(&self) -> u32 {
        self.max_consecutive_stalls
    }

    pub fn get_duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.get_initial_lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.get_resync_timeout(), Duration::from_secs(2));
        assert_eq!(config.get_read_timeout(), Duration::from_secs(1));
        assert_eq!(config.get_max_consecutive_stalls(), 3);
        assert_eq!(config.get_duration(), None);
    }

    #[test]
    fn test_builder_overrides() {
        let config = CaptureConfig::new()
            .with_resync_timeout(Duration::from_millis(250))
            .with_max_consecutive_stalls(0)
            .with_duration(Duration::from_secs(10));

        assert_eq!(config.get_resync_timeout(), Duration::from_millis(250));
        // At least one stall is always tolerated before giving up
        assert_eq!(config.get_max_consecutive_stalls(), 1);
        assert_eq!(config.get_duration(), Some(Duration::from_secs(10)));
    }
}
