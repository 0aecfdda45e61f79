use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::Package;
use crate::error::{CodecError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete packages to any `Write` stream.
pub struct PackageWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> PackageWriter<T> {
    /// Create a new package writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and send one package (blocking).
    pub fn send<P: Package>(&mut self, package: &P) -> Result<()> {
        self.buf.clear();
        package.encode(&mut self.buf)?;
        trace!(len = self.buf.len(), wire = %hex(&self.buf), "sending package");
        let buf = std::mem::take(&mut self.buf);
        let result = self.send_raw(&buf);
        self.buf = buf;
        result
    }

    /// Send raw bytes that are not a package, such as the request line.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(CodecError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Lowercase hex rendering for wire dumps in logs.
pub fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
