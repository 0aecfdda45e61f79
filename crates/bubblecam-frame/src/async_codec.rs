//! `tokio_util` codec adapter for the media demultiplexer.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::debug;

use crate::demux::{decode_chunk, ControlPolicy, DemuxState, MediaChunk};
use crate::error::CodecError;

/// Decoder yielding [`MediaChunk`]s from a camera's media stream.
///
/// Wrap a read half in `FramedRead::new(read_half, DemuxCodec::new())`.
#[derive(Debug, Default)]
pub struct DemuxCodec {
    state: DemuxState,
}

impl DemuxCodec {
    /// Codec using the default control-package policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec using an explicit control-package policy.
    pub fn with_policy(policy: ControlPolicy) -> Self {
        Self {
            state: DemuxState::new(policy),
        }
    }

    /// Demultiplexer state, including counters.
    pub fn state(&self) -> &DemuxState {
        &self.state
    }
}

impl Decoder for DemuxCodec {
    type Item = MediaChunk;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(decode_chunk(src, &mut self.state))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(chunk) = self.decode(src)? {
            return Ok(Some(chunk));
        }
        if !src.is_empty() {
            debug!(leftover = src.len(), "dropping incomplete media header at end of stream");
            src.clear();
        }
        Ok(None)
    }
}
