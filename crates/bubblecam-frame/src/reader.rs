use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::demux::{decode_chunk, ControlPolicy, DemuxState, MediaChunk};
use crate::error::{CodecError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads demultiplexed media chunks from any blocking `Read` stream.
///
/// Handles partial reads internally. Each call returns the next run of
/// payload bytes for one channel, in stream order.
pub struct MediaReader<T> {
    inner: T,
    buf: BytesMut,
    state: DemuxState,
}

impl<T: Read> MediaReader<T> {
    /// Create a media reader with the default control-package policy.
    pub fn new(inner: T) -> Self {
        Self::with_policy(inner, ControlPolicy::default())
    }

    /// Create a media reader with an explicit control-package policy.
    pub fn with_policy(inner: T, policy: ControlPolicy) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: DemuxState::new(policy),
        }
    }

    /// Read the next media chunk (blocking).
    ///
    /// Returns `Err(CodecError::ConnectionClosed)` when EOF is reached.
    pub fn read_chunk(&mut self) -> Result<MediaChunk> {
        loop {
            if let Some(chunk) = decode_chunk(&mut self.buf, &mut self.state) {
                return Ok(chunk);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            };

            if read == 0 {
                return Err(CodecError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Demultiplexer state, including counters.
    pub fn state(&self) -> &DemuxState {
        &self.state
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;

    use super::*;
    use crate::channel::MediaKind;
    use crate::codec::{MediaMessage, MediaType, Package};

    fn media(media_type: MediaType, payload: &[u8]) -> Vec<u8> {
        let mut header = MediaMessage::new(media_type, 0, payload.len() as u32);
        header.header.timestamp = 0;
        let mut wire = BytesMut::new();
        header.encode(&mut wire).unwrap();
        wire.put_slice(payload);
        wire.to_vec()
    }

    #[test]
    fn read_single_chunk() {
        let wire = media(MediaType::Idr, b"frame");

        let mut reader = MediaReader::new(Cursor::new(wire));
        let chunk = reader.read_chunk().unwrap();

        assert_eq!(chunk.kind, MediaKind::Video);
        assert_eq!(chunk.data.as_ref(), b"frame");
    }

    #[test]
    fn read_interleaved_channels() {
        let mut wire = media(MediaType::Idr, b"one");
        wire.extend(media(MediaType::Audio, b"two"));
        wire.extend(media(MediaType::PSlice, b"three"));

        let mut reader = MediaReader::new(Cursor::new(wire));

        let c1 = reader.read_chunk().unwrap();
        let c2 = reader.read_chunk().unwrap();
        let c3 = reader.read_chunk().unwrap();

        assert_eq!((c1.kind, c1.data.as_ref()), (MediaKind::Video, b"one".as_ref()));
        assert_eq!((c2.kind, c2.data.as_ref()), (MediaKind::Audio, b"two".as_ref()));
        assert_eq!(
            (c3.kind, c3.data.as_ref()),
            (MediaKind::Video, b"three".as_ref())
        );
        assert_eq!(reader.state().stats().media_frames, 3);
    }

    #[test]
    fn partial_read_handling() {
        let wire = media(MediaType::Audio, b"slow");

        let mut reader = MediaReader::new(ByteByByteReader {
            bytes: wire,
            pos: 0,
        });

        let mut audio = Vec::new();
        while audio.len() < 4 {
            let chunk = reader.read_chunk().unwrap();
            assert_eq!(chunk.kind, MediaKind::Audio);
            audio.extend_from_slice(&chunk.data);
        }
        assert_eq!(audio, b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = MediaReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_chunk().unwrap_err();
        assert!(matches!(err, CodecError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_header() {
        let wire = media(MediaType::Idr, b"abc");
        let mut reader = MediaReader::new(Cursor::new(wire[..9].to_vec()));
        let err = reader.read_chunk().unwrap_err();
        assert!(matches!(err, CodecError::ConnectionClosed));
    }

    #[test]
    #[cfg(unix)]
    fn stream_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::PackageWriter::new(left);
        let mut reader = MediaReader::new(right);

        writer.send_raw(&media(MediaType::Idr, b"ping")).unwrap();
        let chunk = reader.read_chunk().unwrap();

        assert_eq!(chunk.kind, MediaKind::Video);
        assert_eq!(chunk.data.as_ref(), b"ping");
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = MediaReader::with_policy(
            Cursor::new(Vec::<u8>::new()),
            ControlPolicy::Discard,
        );

        assert_eq!(reader.state().policy(), ControlPolicy::Discard);
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let reader = FlakyReader {
            fail_with: Some(ErrorKind::WouldBlock),
            bytes: media(MediaType::Idr, b"ok"),
            pos: 0,
        };
        let mut framed = MediaReader::new(reader);
        let err = framed.read_chunk().unwrap_err();
        assert!(matches!(err, CodecError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = FlakyReader {
            fail_with: Some(ErrorKind::Interrupted),
            bytes: media(MediaType::Audio, b"ok"),
            pos: 0,
        };
        let mut framed = MediaReader::new(reader);
        let chunk = framed.read_chunk().unwrap();

        assert_eq!(chunk.kind, MediaKind::Audio);
        assert_eq!(chunk.data.as_ref(), b"ok");
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct FlakyReader {
        fail_with: Option<ErrorKind>,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.fail_with.take() {
                return Err(std::io::Error::from(kind));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
