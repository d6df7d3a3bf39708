//! UART byte source backed by `serialport`

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort};
use tracing::info;

use crate::errors::SourceError;
use crate::source::ByteSource;

pub struct SerialSource {
    port: Box<dyn SerialPort>,
}

impl SerialSource {
    /// Open `path` and drop whatever the driver buffered before we attached,
    /// so the first sync starts on live data.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SourceError> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(crate::DEFAULT_READ_TIMEOUT_MS))
            .open()
            .map_err(|e| SourceError::Io(format!("failed to open {}: {}", path, e)))?;

        port.clear(ClearBuffer::Input)
            .map_err(|e| SourceError::Io(e.to_string()))?;

        info!(path, baud_rate, "serial port opened");
        Ok(Self { port })
    }

    pub fn open_default(path: &str) -> Result<Self, SourceError> {
        Self::open(path, crate::DEFAULT_BAUD_RATE)
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl ByteSource for SerialSource {
    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), SourceError> {
        let deadline = Instant::now() + timeout;
        let mut filled = 0;

        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SourceError::Timeout { requested: buf.len(), received: filled });
            }
            self.port
                .set_timeout(remaining)
                .map_err(|e| SourceError::Io(e.to_string()))?;

            // The port blocks for up to `remaining`; coming back empty means
            // that window is spent.
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => return Err(SourceError::Timeout { requested: buf.len(), received: filled }),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    return Err(SourceError::Timeout { requested: buf.len(), received: filled });
                }
                Err(e) => return Err(SourceError::Io(e.to_string())),
            }
        }
        Ok(())
    }
}
