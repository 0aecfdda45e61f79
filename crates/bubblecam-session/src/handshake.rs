//! Connect, authenticate and open a camera stream.
//!
//! The handshake is blocking and bounded per step by [`TimeoutConfig`]:
//!
//! ```text
//! Idle → Connecting → RequestSent → AuthSent → StreamOpened
//! ```
//!
//! Any failure returns the sequencer to `Idle` and reports the
//! step-specific [`SessionError`].
//!
//! [`TimeoutConfig`]: crate::TimeoutConfig

use std::fmt;
use std::io::{ErrorKind, Read};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bubblecam_frame::{
    hex, AuthMessage, AuthMessageReply, MessageType, OpenStreamMessage, Package, PackageType,
    PackageWriter,
};
use bubblecam_transport::{CameraStream, TcpTransport};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// Literal request line that starts every session.
///
/// Cameras ignore the query; the real channel and stream are sent in the
/// open-stream package.
pub const REQUEST_LINE: &[u8] = b"GET /bubble/live?ch=0&stream=0 HTTP/1.1\r\n\r\n";

const GREETING_MAX: usize = 4096;

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Idle,
    Connecting,
    RequestSent,
    AuthSent,
    StreamOpened,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Idle => "idle",
            HandshakeState::Connecting => "connecting",
            HandshakeState::RequestSent => "request-sent",
            HandshakeState::AuthSent => "auth-sent",
            HandshakeState::StreamOpened => "stream-opened",
        };
        f.write_str(name)
    }
}

/// A stream that completed the handshake.
///
/// The camera's open-stream reply is still unread in `stream`.
#[derive(Debug)]
pub struct OpenedStream {
    pub stream: CameraStream,
    /// Reply to the request line, truncated at its first NUL.
    pub greeting: String,
    pub channel: u32,
    pub stream_id: u32,
}

impl OpenedStream {
    /// Address of the camera.
    pub fn peer_addr(&self) -> SocketAddr {
        self.stream.peer_addr()
    }
}

/// Drives the handshake for one config.
#[derive(Debug)]
pub struct Handshake<'a> {
    config: &'a SessionConfig,
    state: HandshakeState,
}

impl<'a> Handshake<'a> {
    pub fn new(config: &'a SessionConfig) -> Self {
        Self {
            config,
            state: HandshakeState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Run every step, blocking until the stream is open or a step fails.
    pub fn run(&mut self) -> Result<OpenedStream> {
        match self.drive() {
            Ok(opened) => {
                self.transition(HandshakeState::StreamOpened);
                info!(
                    peer = %opened.peer_addr(),
                    channel = opened.channel,
                    stream = opened.stream_id,
                    "camera stream opened"
                );
                Ok(opened)
            }
            Err(err) => {
                debug!(state = %self.state, error = %err, "handshake aborted");
                self.transition(HandshakeState::Idle);
                Err(err)
            }
        }
    }

    fn transition(&mut self, next: HandshakeState) {
        debug!(from = %self.state, to = %next, "handshake state");
        self.state = next;
    }

    fn drive(&mut self) -> Result<OpenedStream> {
        let config = self.config;
        let timeouts = config.timeouts;

        // Rejected before any network I/O.
        let auth = AuthMessage::new(&config.username, &config.password)
            .map_err(SessionError::from_credential)?;

        self.transition(HandshakeState::Connecting);
        let mut stream = TcpTransport::connect(&config.host, config.port, timeouts.connect)
            .map_err(SessionError::ConnectionTimeout)?;
        stream
            .set_write_timeout(Some(timeouts.write))
            .map_err(SessionError::ConnectionTimeout)?;

        debug!(len = REQUEST_LINE.len(), "sending request line");
        PackageWriter::new(&mut stream)
            .send_raw(REQUEST_LINE)
            .map_err(|source| SessionError::WriteTimeout {
                step: "request",
                source,
            })?;
        self.transition(HandshakeState::RequestSent);

        let greeting = read_greeting(&mut stream, timeouts.reply)?;
        debug!(%greeting, "camera greeting");

        PackageWriter::new(&mut stream)
            .send(&auth)
            .map_err(|source| SessionError::WriteTimeout {
                step: "auth",
                source,
            })?;
        self.transition(HandshakeState::AuthSent);

        let reply = read_auth_reply(&mut stream, timeouts.reply)?;
        debug!(verify = reply.verify, "auth reply");
        if !reply.is_verified() {
            return Err(SessionError::AuthenticationFailed(
                "camera rejected the credentials".to_string(),
            ));
        }

        let open = OpenStreamMessage::open(config.channel, config.stream);
        PackageWriter::new(&mut stream)
            .send(&open)
            .map_err(|source| SessionError::WriteTimeout {
                step: "open-stream",
                source,
            })?;
        await_open_reply(&stream, timeouts.reply)?;

        Ok(OpenedStream {
            stream,
            greeting,
            channel: config.channel,
            stream_id: config.stream,
        })
    }
}

/// Run the handshake for `config`.
pub fn handshake(config: &SessionConfig) -> Result<OpenedStream> {
    Handshake::new(config).run()
}

fn read_greeting(stream: &mut CameraStream, timeout: Duration) -> Result<String> {
    let read_timeout = || SessionError::ReadTimeout { step: "request" };
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|_| read_timeout())?;

    let mut buf = vec![0u8; GREETING_MAX];
    let n = loop {
        match stream.read(&mut buf) {
            Ok(0) => return Err(read_timeout()),
            Ok(n) => break n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(_) => return Err(read_timeout()),
        }
    };

    let raw = &buf[..n];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

/// Read up to one auth reply, stopping early at the deadline or EOF.
fn read_reply_bytes(stream: &mut CameraStream, len: usize, timeout: Duration) -> Vec<u8> {
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; len];
    let mut filled = 0;

    while filled < len {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || stream.set_read_timeout(Some(remaining)).is_err() {
            break;
        }
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    buf.truncate(filled);
    buf
}

fn read_auth_reply(stream: &mut CameraStream, timeout: Duration) -> Result<AuthMessageReply> {
    let raw = read_reply_bytes(stream, AuthMessageReply::WIRE_SIZE, timeout);
    if raw.is_empty() {
        return Err(SessionError::AuthenticationFailed(format!(
            "no reply within {timeout:?}"
        )));
    }
    debug!(len = raw.len(), wire = %hex(&raw), "received auth reply");

    let reply = AuthMessageReply::decode(&raw)
        .map_err(|err| SessionError::UnexpectedReply(err.to_string()))?;

    let package_type = reply.message.header.package_type;
    let message_type = reply.message.message_type;
    if package_type != PackageType::Message || message_type != MessageType::AuthReply {
        return Err(SessionError::UnexpectedReply(format!(
            "expected auth reply, got {package_type:?}/{message_type:?}"
        )));
    }
    Ok(reply)
}

/// Wait until the open-stream reply is readable without consuming it.
fn await_open_reply(stream: &CameraStream, timeout: Duration) -> Result<()> {
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|err| SessionError::OpenStreamFailed(err.to_string()))?;

    let mut probe = [0u8; 1];
    loop {
        match stream.peek(&mut probe) {
            Ok(0) => {
                return Err(SessionError::OpenStreamFailed(
                    "camera closed the connection".to_string(),
                ))
            }
            Ok(_) => break,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(SessionError::OpenStreamFailed(format!(
                    "no reply within {timeout:?}: {err}"
                )))
            }
        }
    }

    stream
        .set_read_timeout(None)
        .map_err(|err| SessionError::OpenStreamFailed(err.to_string()))
}
