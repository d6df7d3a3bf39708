/// Datagram receiver - one UDP datagram per blob
///
/// Used when the sensor bridge forwards each frame as a single datagram.
/// The socket's read timeout bounds every `read_blob` call.
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use tracing::debug;

use crate::errors::SourceError;
use crate::source::BlobSource;

pub struct UdpBlobSource {
    socket: UdpSocket,
    buffer: Vec<u8>,
    last_sender: Option<SocketAddr>,
}

impl UdpBlobSource {
    /// Wrap an already-bound socket
    pub fn from_socket(
        socket: UdpSocket,
        buffer_size: usize,
        read_timeout: Duration,
    ) -> Result<Self, SourceError> {
        socket.set_read_timeout(Some(read_timeout))?;
        Ok(Self {
            socket,
            buffer: vec![0u8; buffer_size],
            last_sender: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SourceError> {
        Ok(self.socket.local_addr()?)
    }

    /// Address of the peer that sent the most recent blob
    pub fn last_sender(&self) -> Option<SocketAddr> {
        self.last_sender
    }
}

impl BlobSource for UdpBlobSource {
    fn read_blob(&mut self) -> Result<Vec<u8>, SourceError> {
        match self.socket.recv_from(&mut self.buffer) {
            Ok((bytes_received, sender)) => {
                if self.last_sender != Some(sender) {
                    debug!(%sender, "datagram source changed");
                }
                self.last_sender = Some(sender);
                Ok(self.buffer[..bytes_received].to_vec())
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock
                   || e.kind() == std::io::ErrorKind::TimedOut => {
                Err(SourceError::Timeout { requested: self.buffer.len(), received: 0 })
            }
            Err(e) => Err(SourceError::Io(e.to_string())),
        }
    }
}

pub struct UdpReceiverBuilder {
    buffer_size: usize,
    read_timeout: Duration,
}

impl UdpReceiverBuilder {
    pub fn new() -> Self {
        Self {
            buffer_size: crate::MAX_DATAGRAM_SIZE,
            read_timeout: Duration::from_millis(crate::DEFAULT_READ_TIMEOUT_MS),
        }
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn get_buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn get_read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn bind<A: ToSocketAddrs>(self, addr: A) -> Result<UdpBlobSource, SourceError> {
        let socket = UdpSocket::bind(addr)?;
        UdpBlobSource::from_socket(socket, self.buffer_size, self.read_timeout)
    }
}

impl Default for UdpReceiverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiver_builder() {
        let builder = UdpReceiverBuilder::new()
            .with_buffer_size(2048)
            .with_read_timeout(Duration::from_millis(50));

        assert_eq!(builder.get_buffer_size(), 2048);
        assert_eq!(builder.get_read_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_datagram_is_one_blob() {
        let mut source = UdpReceiverBuilder::new()
            .with_read_timeout(Duration::from_millis(500))
            .bind("127.0.0.1:0")
            .unwrap();
        let target = source.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[0x21, 0x01, 0x02], target).unwrap();

        assert_eq!(source.read_blob().unwrap(), vec![0x21, 0x01, 0x02]);
        assert_eq!(source.last_sender(), Some(sender.local_addr().unwrap()));
    }

    #[test]
    fn test_quiet_socket_times_out() {
        let mut source = UdpReceiverBuilder::new()
            .with_read_timeout(Duration::from_millis(20))
            .bind("127.0.0.1:0")
            .unwrap();

        let err = source.read_blob().unwrap_err();
        assert!(err.is_timeout());
    }
}
