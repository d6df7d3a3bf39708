/// Byte source abstractions
///
/// The decode loop pulls bytes through one of two contracts:
/// - `ByteSource`: blocking `read_exact` with an explicit timeout (serial, SPI, files)
/// - `BlobSource`: one pre-delimited blob per call (RPC bridge, datagrams)
///
/// Every read is bounded. A timeout surfaces as `SourceError::Timeout`,
/// never as a hang.
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use crate::errors::SourceError;

/// Streaming byte source
pub trait ByteSource {
    /// Fill `buf` completely or fail.
    ///
    /// On `Timeout` the bytes already received are consumed and lost.
    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), SourceError>;
}

/// Atomic blob source
pub trait BlobSource {
    /// Fetch the next blob, already normalized to raw bytes.
    ///
    /// An empty blob means the remote had nothing to send.
    fn read_blob(&mut self) -> Result<Vec<u8>, SourceError>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), SourceError> {
        (**self).read_exact(buf, timeout)
    }
}

impl<S: BlobSource + ?Sized> BlobSource for &mut S {
    fn read_blob(&mut self) -> Result<Vec<u8>, SourceError> {
        (**self).read_blob()
    }
}

/// Adapts any `std::io::Read` into a `ByteSource`.
///
/// End of input is reported as a timeout: to the decode loop a finished
/// capture file is indistinguishable from a link that went quiet.
///
/// The wrapped reader must block. A reader with its own timeout may return
/// `TimedOut` after waiting; it is read again only while the deadline has
/// not passed. `WouldBlock` ends the request at once as a timeout, so a
/// non-blocking reader is never polled in a loop.
pub struct ReaderSource<R> {
    inner: R,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), SourceError> {
        let deadline = Instant::now() + timeout;
        let mut filled = 0;

        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    if Instant::now() >= deadline {
                        break;
                    }
                }
                Err(e) => return Err(SourceError::Io(e.to_string())),
            }
        }

        if filled < buf.len() {
            return Err(SourceError::Timeout { requested: buf.len(), received: filled });
        }
        Ok(())
    }
}

/// Raw RPC response as the bridge hands it over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcResponse {
    /// Byte payload; may itself be ASCII hex
    Bytes(Vec<u8>),
    /// Text payload; must be hex
    Text(String),
}

/// Normalize an RPC response into raw frame bytes.
///
/// Byte payloads that are non-empty, even-length and pure ASCII hex are
/// decoded; other byte payloads pass through verbatim. Text payloads must
/// decode as hex.
pub fn normalize_response(response: RpcResponse) -> Result<Vec<u8>, SourceError> {
    match response {
        RpcResponse::Bytes(raw) => {
            let looks_hex = !raw.is_empty()
                && raw.len() % 2 == 0
                && raw.iter().all(u8::is_ascii_hexdigit);
            if looks_hex {
                if let Ok(decoded) = hex::decode(&raw) {
                    return Ok(decoded);
                }
            }
            Ok(raw)
        }
        RpcResponse::Text(text) => hex::decode(text.trim()).map_err(|e| {
            SourceError::UnrecognizedEncoding(format!("text response is not hex: {}", e))
        }),
    }
}

/// `BlobSource` over an RPC call.
///
/// The transport itself stays outside the crate; `call` performs one
/// blocking request and returns whatever the bridge produced.
pub struct RpcBlobSource<F> {
    call: F,
}

impl<F> RpcBlobSource<F>
where
    F: FnMut() -> Result<RpcResponse, SourceError>,
{
    pub fn new(call: F) -> Self {
        Self { call }
    }
}

impl<F> BlobSource for RpcBlobSource<F>
where
    F: FnMut() -> Result<RpcResponse, SourceError>,
{
    fn read_blob(&mut self) -> Result<Vec<u8>, SourceError> {
        let response = (self.call)()?;
        normalize_response(response)
    }
}
