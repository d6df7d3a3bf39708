//! framesync_core - frame synchronization for sensor byte links
//!
//! Recovers validated sample frames from an unreliable byte stream (serial,
//! SPI, capture files) or from pre-delimited blobs (RPC bridge, datagrams).
//!
//! # Pipeline
//! - `sync`: find the magic marker, strip the blob overflow prefix
//! - `decoder`: bounded header, exact payload, CRC-16, bit-depth mask
//! - `sequence`: wraparound-aware gap detection
//! - `session`: the pull loop that counts, resyncs and delivers frames
//!
//! A rejected frame never reaches the consumer and never stops the loop;
//! only source failures do.

pub mod errors;
pub mod crc;
pub mod format;
pub mod frame;
pub mod source;
pub mod receiver;
#[cfg(feature = "serial")]
pub mod serial;
pub mod sync;
pub mod decoder;
pub mod encoder;
pub mod sequence;
pub mod config;
pub mod cancel;
pub mod summary;
pub mod session;

pub use cancel::CancelToken;
pub use config::CaptureConfig;
pub use crc::Crc16;
pub use decoder::{decode_blob, FrameDecoder};
pub use encoder::{encode_blob, encode_frame};
pub use errors::{CaptureError, FrameError, Result, SourceError};
pub use format::{FrameFormat, BUILTIN_FORMATS, EXTENDED, INTERLEAVED, MINIMAL, RPC_SEQUENCED};
pub use frame::DecodedFrame;
pub use sequence::SequenceTracker;
pub use session::{CaptureSession, FrameConsumer};
#[cfg(feature = "serial")]
pub use serial::SerialSource;
pub use source::{normalize_response, BlobSource, ByteSource, ReaderSource, RpcBlobSource, RpcResponse};
pub use summary::{EndReason, SessionStats, SessionSummary};
pub use sync::{SyncState, Synchronizer};

/// Window for the first marker of a session (milliseconds)
pub const DEFAULT_INITIAL_LOCK_TIMEOUT_MS: u64 = 5000;

/// Window for every re-acquisition after the first lock (milliseconds)
pub const DEFAULT_RESYNC_TIMEOUT_MS: u64 = 2000;

/// Bound on each read inside a frame (milliseconds)
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Consecutive stalls tolerated before the link is declared dead
pub const DEFAULT_MAX_CONSECUTIVE_STALLS: u32 = 3;

/// Largest UDP payload over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Line rate the sensor firmware's UART runs at
pub const DEFAULT_BAUD_RATE: u32 = 2_000_000;
