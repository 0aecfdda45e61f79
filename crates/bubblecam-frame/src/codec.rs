use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::channel::MediaKind;
use crate::error::{CodecError, Result};

/// Marker byte that starts every package.
pub const MARKER: u8 = 0xAA;

/// Package header: marker (1) + length (4) + type (1) + timestamp (4) = 10 bytes.
pub const PACKAGE_HEADER_SIZE: usize = 10;

/// Message header: package header (10) + body length (4) + type (1) + reserved (3).
pub const MESSAGE_HEADER_SIZE: usize = PACKAGE_HEADER_SIZE + 8;

/// Media header: package header (10) + payload length (4) + media type (1) + channel (1).
pub const MEDIA_HEADER_SIZE: usize = PACKAGE_HEADER_SIZE + 6;

/// Fixed width of the username and password fields.
pub const CREDENTIAL_FIELD_SIZE: usize = 20;

/// Width of the opaque token in an auth reply.
pub const AUTH_TOKEN_SIZE: usize = 32;

/// The only heartbeat payload cameras have been seen to use.
pub const HEARTBEAT_PAYLOAD: u8 = 0x02;

/// Bytes not counted by the header length field: marker (1) + length (4).
pub const LENGTH_PREFIX_SIZE: usize = 5;

/// Top-level package type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageType {
    Message,
    Media,
    Heartbeat,
    OpenChannel,
    OpenStream,
    Other(u8),
}

impl From<u8> for PackageType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => PackageType::Message,
            0x01 => PackageType::Media,
            0x02 => PackageType::Heartbeat,
            0x04 => PackageType::OpenChannel,
            0x0a => PackageType::OpenStream,
            other => PackageType::Other(other),
        }
    }
}

impl From<PackageType> for u8 {
    fn from(value: PackageType) -> Self {
        match value {
            PackageType::Message => 0x00,
            PackageType::Media => 0x01,
            PackageType::Heartbeat => 0x02,
            PackageType::OpenChannel => 0x04,
            PackageType::OpenStream => 0x0a,
            PackageType::Other(other) => other,
        }
    }
}

/// Message type tag carried by `Message` packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Auth,
    ChannelRequest,
    PtzControl,
    AuthReply,
    ChannelRequestReply,
    Other(u8),
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => MessageType::Auth,
            0x01 => MessageType::ChannelRequest,
            0x02 => MessageType::PtzControl,
            0x03 => MessageType::AuthReply,
            0x04 => MessageType::ChannelRequestReply,
            other => MessageType::Other(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Auth => 0x00,
            MessageType::ChannelRequest => 0x01,
            MessageType::PtzControl => 0x02,
            MessageType::AuthReply => 0x03,
            MessageType::ChannelRequestReply => 0x04,
            MessageType::Other(other) => other,
        }
    }
}

/// Media type tag carried by `Media` packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    /// Key frame.
    Idr,
    PSlice,
    Other(u8),
}

impl MediaType {
    /// Output channel for this media type, `None` for unknown tags.
    pub fn kind(self) -> Option<MediaKind> {
        match self {
            MediaType::Audio => Some(MediaKind::Audio),
            MediaType::Idr | MediaType::PSlice => Some(MediaKind::Video),
            MediaType::Other(_) => None,
        }
    }
}

impl From<u8> for MediaType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => MediaType::Audio,
            0x01 => MediaType::Idr,
            0x02 => MediaType::PSlice,
            other => MediaType::Other(other),
        }
    }
}

impl From<MediaType> for u8 {
    fn from(value: MediaType) -> Self {
        match value {
            MediaType::Audio => 0x00,
            MediaType::Idr => 0x01,
            MediaType::PSlice => 0x02,
            MediaType::Other(other) => other,
        }
    }
}

/// A fixed-layout package that can be written to and parsed from the wire.
///
/// All multi-byte integers are big-endian. Decoding takes the first
/// [`Package::WIRE_SIZE`] bytes of `src` and ignores anything after them.
pub trait Package: Sized {
    /// Exact encoded size in bytes.
    const WIRE_SIZE: usize;

    /// Append the encoded package to `dst`.
    fn encode(&self, dst: &mut BytesMut) -> Result<()>;

    /// Parse a package from the start of `src`.
    fn decode(src: &[u8]) -> Result<Self>;

    /// Encode into a freshly allocated buffer.
    fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(Self::WIRE_SIZE);
        self.encode(&mut dst)?;
        Ok(dst.freeze())
    }
}

fn ensure_len(src: &[u8], needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(CodecError::TruncatedInput {
            needed,
            actual: src.len(),
        });
    }
    Ok(())
}

/// Low 32 bits of the current time in microseconds since the Unix epoch.
///
/// Cameras treat the field as opaque.
pub fn current_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u32)
        .unwrap_or(0)
}

/// Common 10-byte prefix of every package.
///
/// Wire format:
/// ```text
/// ┌────────┬──────────────┬──────────┬────────────────┐
/// │ Marker │ Length       │ Type     │ Timestamp      │
/// │ 0xAA   │ (4B BE)      │ (1B)     │ (4B BE)        │
/// └────────┴──────────────┴──────────┴────────────────┘
/// ```
///
/// `length` counts every byte after the length field itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageHeader {
    pub length: u32,
    pub package_type: PackageType,
    pub timestamp: u32,
}

impl PackageHeader {
    /// Header for a package of `wire_size` bytes, stamped with the current time.
    pub fn new(package_type: PackageType, wire_size: usize) -> Self {
        Self {
            length: u32::try_from(wire_size.saturating_sub(LENGTH_PREFIX_SIZE))
                .unwrap_or(u32::MAX),
            package_type,
            timestamp: current_timestamp(),
        }
    }

    /// Total wire size of the package as declared by `length`.
    pub fn declared_size(&self) -> usize {
        (self.length as usize).saturating_add(LENGTH_PREFIX_SIZE)
    }

    fn put(&self, dst: &mut BytesMut) {
        dst.put_u8(MARKER);
        dst.put_u32(self.length);
        dst.put_u8(self.package_type.into());
        dst.put_u32(self.timestamp);
    }

    fn get(src: &mut &[u8]) -> Result<Self> {
        let marker = src.get_u8();
        if marker != MARKER {
            return Err(CodecError::InvalidMarker(marker));
        }
        Ok(Self {
            length: src.get_u32(),
            package_type: PackageType::from(src.get_u8()),
            timestamp: src.get_u32(),
        })
    }
}

impl Package for PackageHeader {
    const WIRE_SIZE: usize = PACKAGE_HEADER_SIZE;

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(Self::WIRE_SIZE);
        self.put(dst);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::WIRE_SIZE)?;
        let mut src = src;
        Self::get(&mut src)
    }
}

/// Prefix shared by all `Message` packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub header: PackageHeader,
    pub body_length: u32,
    pub message_type: MessageType,
}

impl MessageHeader {
    fn new(message_type: MessageType, wire_size: usize) -> Self {
        Self {
            header: PackageHeader::new(PackageType::Message, wire_size),
            // The body starts at the message type byte.
            body_length: (wire_size - MESSAGE_HEADER_SIZE + 1) as u32,
            message_type,
        }
    }

    fn put(&self, dst: &mut BytesMut) {
        self.header.put(dst);
        dst.put_u32(self.body_length);
        dst.put_u8(self.message_type.into());
        dst.put_bytes(0, 3);
    }

    fn get(src: &mut &[u8]) -> Result<Self> {
        let header = PackageHeader::get(src)?;
        let body_length = src.get_u32();
        let message_type = MessageType::from(src.get_u8());
        src.advance(3);
        Ok(Self {
            header,
            body_length,
            message_type,
        })
    }
}

impl Package for MessageHeader {
    const WIRE_SIZE: usize = MESSAGE_HEADER_SIZE;

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(Self::WIRE_SIZE);
        self.put(dst);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::WIRE_SIZE)?;
        let mut src = src;
        Self::get(&mut src)
    }
}

/// Login request carrying fixed-width, null-padded credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthMessage {
    pub message: MessageHeader,
    pub username: String,
    pub password: String,
}

impl AuthMessage {
    /// Build an auth message, rejecting credentials that do not fit.
    pub fn new(username: &str, password: &str) -> Result<Self> {
        validate_credential("username", username)?;
        validate_credential("password", password)?;
        Ok(Self {
            message: MessageHeader::new(MessageType::Auth, Self::WIRE_SIZE),
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Reject a credential longer than its fixed field.
pub fn validate_credential(field: &'static str, value: &str) -> Result<()> {
    if value.len() > CREDENTIAL_FIELD_SIZE {
        return Err(CodecError::CredentialTooLong {
            field,
            len: value.len(),
            max: CREDENTIAL_FIELD_SIZE,
        });
    }
    Ok(())
}

fn put_credential(dst: &mut BytesMut, value: &str) {
    dst.put_slice(value.as_bytes());
    dst.put_bytes(0, CREDENTIAL_FIELD_SIZE - value.len());
}

fn get_credential(src: &mut &[u8], field: &'static str) -> Result<String> {
    let raw = &src[..CREDENTIAL_FIELD_SIZE];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let value = std::str::from_utf8(&raw[..end])
        .map_err(|_| CodecError::InvalidCredential { field })?
        .to_string();
    src.advance(CREDENTIAL_FIELD_SIZE);
    Ok(value)
}

impl Package for AuthMessage {
    const WIRE_SIZE: usize = MESSAGE_HEADER_SIZE + 2 * CREDENTIAL_FIELD_SIZE;

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        validate_credential("username", &self.username)?;
        validate_credential("password", &self.password)?;
        dst.reserve(Self::WIRE_SIZE);
        self.message.put(dst);
        put_credential(dst, &self.username);
        put_credential(dst, &self.password);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::WIRE_SIZE)?;
        let mut src = src;
        let message = MessageHeader::get(&mut src)?;
        let username = get_credential(&mut src, "username")?;
        let password = get_credential(&mut src, "password")?;
        Ok(Self {
            message,
            username,
            password,
        })
    }
}

impl fmt::Debug for AuthMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMessage")
            .field("message", &self.message)
            .field("username", &self.username)
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .finish()
    }
}

/// Camera's answer to an [`AuthMessage`].
#[derive(Clone, PartialEq, Eq)]
pub struct AuthMessageReply {
    pub message: MessageHeader,
    /// Nonzero when the camera accepted the credentials.
    pub verify: u8,
    /// Opaque session token; nothing else in the protocol uses it.
    pub auth_token: [u8; AUTH_TOKEN_SIZE],
}

impl AuthMessageReply {
    /// Build a reply (cameras send these; the client only parses them).
    pub fn new(verified: bool, auth_token: [u8; AUTH_TOKEN_SIZE]) -> Self {
        Self {
            message: MessageHeader::new(MessageType::AuthReply, Self::WIRE_SIZE),
            verify: u8::from(verified),
            auth_token,
        }
    }

    /// True when the camera accepted the credentials.
    pub fn is_verified(&self) -> bool {
        self.verify != 0
    }
}

impl Package for AuthMessageReply {
    const WIRE_SIZE: usize = MESSAGE_HEADER_SIZE + 4 + AUTH_TOKEN_SIZE;

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(Self::WIRE_SIZE);
        self.message.put(dst);
        dst.put_u8(self.verify);
        dst.put_bytes(0, 3);
        dst.put_slice(&self.auth_token);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::WIRE_SIZE)?;
        let mut src = src;
        let message = MessageHeader::get(&mut src)?;
        let verify = src.get_u8();
        src.advance(3);
        let mut auth_token = [0u8; AUTH_TOKEN_SIZE];
        src.copy_to_slice(&mut auth_token);
        Ok(Self {
            message,
            verify,
            auth_token,
        })
    }
}

impl fmt::Debug for AuthMessageReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMessageReply")
            .field("message", &self.message)
            .field("verify", &self.verify)
            .field("auth_token", &format_args!("<redacted:{AUTH_TOKEN_SIZE} bytes>"))
            .finish()
    }
}

/// Opens or closes delivery of a camera channel/stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenStreamMessage {
    pub header: PackageHeader,
    pub channel: u32,
    pub stream: u32,
    /// Raw open flag: 1 opens, 0 closes. Other values are kept as received.
    pub opened: u32,
}

impl OpenStreamMessage {
    /// Request to start streaming `channel`/`stream`.
    pub fn open(channel: u32, stream: u32) -> Self {
        Self::with_state(channel, stream, 1)
    }

    /// Request to stop streaming `channel`/`stream`.
    pub fn close(channel: u32, stream: u32) -> Self {
        Self::with_state(channel, stream, 0)
    }

    /// True for any nonzero open flag.
    pub fn is_opened(&self) -> bool {
        self.opened != 0
    }

    fn with_state(channel: u32, stream: u32, opened: u32) -> Self {
        Self {
            header: PackageHeader::new(PackageType::OpenStream, Self::WIRE_SIZE),
            channel,
            stream,
            opened,
        }
    }
}

impl Package for OpenStreamMessage {
    const WIRE_SIZE: usize = PACKAGE_HEADER_SIZE + 16;

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(Self::WIRE_SIZE);
        self.header.put(dst);
        dst.put_u32(self.channel);
        dst.put_u32(self.stream);
        dst.put_u32(self.opened);
        dst.put_u32(0);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::WIRE_SIZE)?;
        let mut src = src;
        let header = PackageHeader::get(&mut src)?;
        let channel = src.get_u32();
        let stream = src.get_u32();
        let opened = src.get_u32();
        Ok(Self {
            header,
            channel,
            stream,
            opened,
        })
    }
}

/// Keep-alive sent periodically while streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatMessage {
    pub header: PackageHeader,
    pub payload: u8,
}

impl HeartbeatMessage {
    pub fn new() -> Self {
        Self {
            header: PackageHeader::new(PackageType::Heartbeat, Self::WIRE_SIZE),
            payload: HEARTBEAT_PAYLOAD,
        }
    }
}

impl Default for HeartbeatMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl Package for HeartbeatMessage {
    const WIRE_SIZE: usize = PACKAGE_HEADER_SIZE + 1;

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(Self::WIRE_SIZE);
        self.header.put(dst);
        dst.put_u8(self.payload);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::WIRE_SIZE)?;
        let mut src = src;
        let header = PackageHeader::get(&mut src)?;
        let payload = src.get_u8();
        Ok(Self { header, payload })
    }
}

/// Header of a media frame.
///
/// `payload_length` bytes of encoded audio or video follow it in the
/// stream; the payload is not part of this struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaMessage {
    pub header: PackageHeader,
    pub payload_length: u32,
    pub media_type: MediaType,
    pub channel_id: u8,
}

impl MediaMessage {
    /// Header announcing `payload_length` bytes of `media_type`.
    pub fn new(media_type: MediaType, channel_id: u8, payload_length: u32) -> Self {
        // Saturates in the header length when the payload nearly fills u32.
        let wire_size = Self::WIRE_SIZE.saturating_add(payload_length as usize);
        Self {
            header: PackageHeader::new(PackageType::Media, wire_size),
            payload_length,
            media_type,
            channel_id,
        }
    }
}

impl Package for MediaMessage {
    const WIRE_SIZE: usize = MEDIA_HEADER_SIZE;

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(Self::WIRE_SIZE);
        self.header.put(dst);
        dst.put_u32(self.payload_length);
        dst.put_u8(self.media_type.into());
        dst.put_u8(self.channel_id);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, Self::WIRE_SIZE)?;
        let mut src = src;
        let header = PackageHeader::get(&mut src)?;
        let payload_length = src.get_u32();
        let media_type = MediaType::from(src.get_u8());
        let channel_id = src.get_u8();
        Ok(Self {
            header,
            payload_length,
            media_type,
            channel_id,
        })
    }
}
