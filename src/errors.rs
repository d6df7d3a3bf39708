/// Error types for frame capture
///
/// Three layers, matching where a failure is handled:
/// - `FrameError`: one candidate frame was rejected; counted, then resync
/// - `SourceError`: raised at the byte-source boundary
/// - `CaptureError`: terminates (or refuses to start) a capture session
use std::fmt;
use std::io;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Per-frame validation failure. Never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Sample count field outside `[1, max_samples]`
    MalformedHeader { sample_count: u32, max_samples: u16 },

    /// Blob for a marker-carrying format did not start with the marker
    MissingMarker,

    /// Delivered frame length differs from the length declared by its header
    LengthMismatch { expected: usize, actual: usize },

    /// CRC computed over the covered bytes differs from the transmitted one
    ChecksumMismatch { expected: u16, computed: u16 },

    /// Source stalled mid-frame
    ShortRead { requested: usize, received: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedHeader { sample_count, max_samples } => {
                write!(f, "Malformed header: sample count {} outside 1..={}", sample_count, max_samples)
            }
            Self::MissingMarker => write!(f, "Frame does not start with the magic marker"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "Frame length mismatch: expected {} bytes, got {}", expected, actual)
            }
            Self::ChecksumMismatch { expected, computed } => {
                write!(f, "Checksum mismatch: frame carries {:#06x}, computed {:#06x}", expected, computed)
            }
            Self::ShortRead { requested, received } => {
                write!(f, "Link timeout mid-frame: requested {} bytes, received {}", requested, received)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Failure reported by a byte source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Deadline elapsed before the request was satisfied
    Timeout { requested: usize, received: usize },

    /// Unrecoverable device failure (unplugged, permission denied, ...)
    Io(String),

    /// RPC response in an encoding we cannot turn into bytes
    UnrecognizedEncoding(String),
}

impl SourceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { requested, received } => {
                write!(f, "Source timeout: requested {} bytes, received {}", requested, received)
            }
            Self::Io(msg) => write!(f, "Source I/O error: {}", msg),
            Self::UnrecognizedEncoding(msg) => write!(f, "Unrecognized response encoding: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<io::Error> for SourceError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Session-level error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Byte source failed in a way that cannot be resynchronized
    Io(String),

    /// RPC response could not be normalized to bytes
    UnrecognizedEncoding(String),

    /// No marker observed within the lock window
    SyncTimeout { window_ms: u64 },

    /// Frame format descriptor is inconsistent
    InvalidFormat(String),

    /// Frame cannot be represented in the requested wire format
    Encode(String),

    /// A single frame was rejected
    Frame(FrameError),
}

impl CaptureError {
    /// True when the decode loop may count the failure and resync
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Frame(_))
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::UnrecognizedEncoding(msg) => write!(f, "Unrecognized response encoding: {}", msg),
            Self::SyncTimeout { window_ms } => {
                write!(f, "No frame marker found within the {} ms window", window_ms)
            }
            Self::InvalidFormat(msg) => write!(f, "Invalid frame format: {}", msg),
            Self::Encode(msg) => write!(f, "Encode error: {}", msg),
            Self::Frame(err) => write!(f, "Frame rejected: {}", err),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<io::Error> for CaptureError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<FrameError> for CaptureError {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

/// A timeout converted here happened inside a frame body. The synchronizer
/// reports its own timeouts as `SyncTimeout` before reaching this impl.
impl From<SourceError> for CaptureError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Timeout { requested, received } => {
                Self::Frame(FrameError::ShortRead { requested, received })
            }
            SourceError::Io(msg) => Self::Io(msg),
            SourceError::UnrecognizedEncoding(msg) => Self::UnrecognizedEncoding(msg),
        }
    }
}
