//! Media stream demultiplexer.
//!
//! After the handshake the camera sends an unstructured byte stream: media
//! headers, their payloads (which may span any number of TCP reads), and
//! the occasional control package. [`decode_chunk`] turns that stream into
//! ordered [`MediaChunk`]s on the video and audio channels, carrying the
//! in-flight frame across calls in a [`DemuxState`].

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::channel::MediaKind;
use crate::codec::{MediaMessage, Package, PackageType, MARKER, MEDIA_HEADER_SIZE};

/// Largest control package the `Discard` policy will skip.
pub const MAX_DISCARD_SIZE: usize = 64 * 1024;

/// A run of payload bytes routed to one output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    pub kind: MediaKind,
    pub data: Bytes,
}

/// What to do with a package that is not a recognized media frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlPolicy {
    /// Consume only the marker byte and route it to the active channel as
    /// payload. The rest of the package then flows as continuation bytes.
    /// This is what cameras' reference client does.
    #[default]
    LeakMarkerByte,
    /// Drop the whole package as sized by its header.
    Discard,
}

/// Outcome of the control-package decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlAction {
    Leak,
    Skip(usize),
}

impl ControlPolicy {
    fn action(self, declared_size: usize) -> ControlAction {
        match self {
            ControlPolicy::LeakMarkerByte => ControlAction::Leak,
            ControlPolicy::Discard if (1..=MAX_DISCARD_SIZE).contains(&declared_size) => {
                ControlAction::Skip(declared_size)
            }
            ControlPolicy::Discard => ControlAction::Leak,
        }
    }
}

/// Counters kept while demultiplexing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub video_bytes: u64,
    pub audio_bytes: u64,
    pub media_frames: u64,
    pub control_packages: u64,
    pub anomalies: u64,
}

/// Session-scoped demultiplexer state.
#[derive(Debug, Clone, Default)]
pub struct DemuxState {
    bytes_remaining: usize,
    active_channel: MediaKind,
    discard_remaining: usize,
    policy: ControlPolicy,
    stats: DemuxStats,
}

impl DemuxState {
    /// Fresh state using `policy` for control packages.
    pub fn new(policy: ControlPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Payload bytes still owed to the in-flight media frame.
    pub fn bytes_remaining(&self) -> usize {
        self.bytes_remaining
    }

    /// Channel that continuation bytes are routed to.
    pub fn active_channel(&self) -> MediaKind {
        self.active_channel
    }

    /// Control-package policy in effect.
    pub fn policy(&self) -> ControlPolicy {
        self.policy
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> DemuxStats {
        self.stats
    }

    fn emit(&mut self, kind: MediaKind, data: Bytes) -> MediaChunk {
        match kind {
            MediaKind::Video => self.stats.video_bytes += data.len() as u64,
            MediaKind::Audio => self.stats.audio_bytes += data.len() as u64,
        }
        MediaChunk { kind, data }
    }

    fn continuation(&mut self, data: Bytes) -> MediaChunk {
        self.bytes_remaining = self.bytes_remaining.saturating_sub(data.len());
        self.emit(self.active_channel, data)
    }

    /// Single decision point for packages that are not media frames.
    fn control_package(&mut self, src: &mut BytesMut, declared_size: usize) -> Option<MediaChunk> {
        self.stats.control_packages += 1;
        match self.policy.action(declared_size) {
            ControlAction::Leak => {
                let marker = src.split_to(1).freeze();
                Some(self.continuation(marker))
            }
            ControlAction::Skip(size) => {
                self.discard_remaining = size;
                None
            }
        }
    }
}

/// Decode the next media chunk from `src`.
///
/// Returns `None` when `src` is exhausted or holds only an incomplete media
/// header; the unconsumed bytes stay in `src` until more data is appended.
/// Consumed bytes are removed from the front of `src`.
pub fn decode_chunk(src: &mut BytesMut, state: &mut DemuxState) -> Option<MediaChunk> {
    loop {
        if src.is_empty() {
            return None;
        }

        if state.discard_remaining > 0 {
            let n = state.discard_remaining.min(src.len());
            src.advance(n);
            state.discard_remaining -= n;
            continue;
        }

        // Bytes owed to the in-flight payload are never scanned for a marker.
        let owed = state.bytes_remaining.min(src.len());
        let next_marker = src[owed..]
            .iter()
            .position(|&b| b == MARKER)
            .map_or(src.len(), |i| owed + i);

        if next_marker > 0 {
            let data = src.split_to(next_marker).freeze();
            return Some(state.continuation(data));
        }

        if src.len() < MEDIA_HEADER_SIZE {
            trace!(buffered = src.len(), "waiting for complete media header");
            return None;
        }

        let header = match MediaMessage::decode(&src[..MEDIA_HEADER_SIZE]) {
            Ok(header) => header,
            Err(err) => {
                warn!(error = %err, "unparseable package header");
                state.stats.anomalies += 1;
                match state.control_package(src, 0) {
                    Some(chunk) => return Some(chunk),
                    None => continue,
                }
            }
        };

        if header.header.package_type != PackageType::Media {
            debug!(
                package_type = u8::from(header.header.package_type),
                length = header.header.length,
                "control package in media stream"
            );
            match state.control_package(src, header.header.declared_size()) {
                Some(chunk) => return Some(chunk),
                None => continue,
            }
        }

        let Some(kind) = header.media_type.kind() else {
            warn!(
                media_type = u8::from(header.media_type),
                "unknown media type"
            );
            state.stats.anomalies += 1;
            let declared = MEDIA_HEADER_SIZE.saturating_add(header.payload_length as usize);
            match state.control_package(src, declared) {
                Some(chunk) => return Some(chunk),
                None => continue,
            }
        };

        src.advance(MEDIA_HEADER_SIZE);
        let declared = header.payload_length as usize;
        let available = declared.min(src.len());
        let data = src.split_to(available).freeze();

        state.active_channel = kind;
        state.bytes_remaining = declared - available;
        state.stats.media_frames += 1;
        trace!(
            %kind,
            declared,
            available,
            remaining = state.bytes_remaining,
            "media header"
        );

        if !data.is_empty() {
            return Some(state.emit(kind, data));
        }
    }
}

/// Push-style demultiplexer owning its working buffer.
#[derive(Debug, Default)]
pub struct Demultiplexer {
    buf: BytesMut,
    state: DemuxState,
}

impl Demultiplexer {
    /// Demultiplexer using the default control-package policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Demultiplexer using an explicit control-package policy.
    pub fn with_policy(policy: ControlPolicy) -> Self {
        Self {
            buf: BytesMut::new(),
            state: DemuxState::new(policy),
        }
    }

    /// Feed one inbound chunk and collect everything it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<MediaChunk> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(media) = decode_chunk(&mut self.buf, &mut self.state) {
            out.push(media);
        }
        out
    }

    /// Current state.
    pub fn state(&self) -> &DemuxState {
        &self.state
    }

    /// Bytes held back waiting for a complete header.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
