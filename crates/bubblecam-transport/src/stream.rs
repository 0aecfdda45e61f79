use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected camera stream, readable and writable.
///
/// This is the fundamental I/O type returned by transport operations. The
/// handshake drives it in blocking mode; once the stream is open it is
/// handed over to the async session with [`CameraStream::into_std`].
pub struct CameraStream {
    inner: TcpStream,
    peer: SocketAddr,
}

impl Read for CameraStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for CameraStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl CameraStream {
    pub(crate) fn from_tcp(inner: TcpStream, peer: SocketAddr) -> Self {
        Self { inner, peer }
    }

    /// Set read timeout on the underlying socket.
    ///
    /// A zero duration is treated as "no timeout" instead of an error.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner
            .set_read_timeout(timeout.filter(|t| !t.is_zero()))
            .map_err(Into::into)
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner
            .set_write_timeout(timeout.filter(|t| !t.is_zero()))
            .map_err(Into::into)
    }

    /// Wait for inbound data without consuming it.
    ///
    /// Honors the read timeout. Returns `Ok(0)` if the peer closed the stream.
    pub fn peek(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.peek(buf)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned, self.peer))
    }

    /// Address of the camera this stream is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Shut down both directions of the connection.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.shutdown(Shutdown::Both).map_err(Into::into)
    }

    /// Consume the stream and return the underlying socket.
    pub fn into_std(self) -> TcpStream {
        self.inner
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("peer", &self.peer)
            .finish()
    }
}
