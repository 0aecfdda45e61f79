//! Package codec and media demultiplexing for the bubble camera protocol.
//!
//! Every control package starts with a 10-byte header:
//! - A 1-byte marker (`0xAA`) for stream synchronization
//! - A 4-byte big-endian length (wire size minus 5)
//! - A 1-byte package type
//! - A 4-byte big-endian timestamp
//!
//! Once a stream is open the camera interleaves media headers with raw
//! H.264 and audio payload. The demultiplexer splits that stream into
//! video and audio byte runs without requiring packages to align with reads.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod channel;
pub mod codec;
pub mod demux;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::DemuxCodec;
pub use channel::MediaKind;
pub use codec::{
    validate_credential, AuthMessage, AuthMessageReply, HeartbeatMessage, MediaMessage,
    MediaType, MessageHeader, MessageType, OpenStreamMessage, Package, PackageHeader,
    PackageType, AUTH_TOKEN_SIZE, CREDENTIAL_FIELD_SIZE, MARKER, MEDIA_HEADER_SIZE,
    PACKAGE_HEADER_SIZE,
};
pub use demux::{
    decode_chunk, ControlPolicy, DemuxState, DemuxStats, Demultiplexer, MediaChunk,
    MAX_DISCARD_SIZE,
};
pub use error::{CodecError, Result};
pub use reader::MediaReader;
pub use writer::{hex, PackageWriter};
