//! Loopback camera used by the handshake and session tests.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

use bubblecam_frame::{
    AuthMessage, AuthMessageReply, MediaMessage, MediaType, OpenStreamMessage, Package,
    AUTH_TOKEN_SIZE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthBehavior {
    Accept,
    Reject,
    Silent,
    WrongMessageType,
}

#[derive(Debug, Clone)]
pub(crate) struct Script {
    pub greeting: Vec<u8>,
    pub auth: AuthBehavior,
    pub answer_open: bool,
    /// Bytes sent right after the open-stream reply.
    pub media: Vec<u8>,
    /// Close the connection after sending `media` instead of waiting.
    pub hang_up: bool,
    /// Stop reading after `media` and close while client bytes are unread,
    /// which resets the connection.
    pub reset: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: b"HTTP/1.1 200 OK\r\n\r\n".to_vec(),
            auth: AuthBehavior::Accept,
            answer_open: true,
            media: Vec::new(),
            hang_up: false,
            reset: false,
        }
    }
}

/// What the camera saw from the client.
#[derive(Debug, Default)]
pub(crate) struct Captured {
    pub request: Vec<u8>,
    pub auth: Option<AuthMessage>,
    pub open: Option<OpenStreamMessage>,
    /// Everything received after the open-stream request, until EOF.
    pub trailing: Vec<u8>,
}

pub(crate) struct FakeCamera {
    pub port: u16,
    handle: JoinHandle<Captured>,
}

impl FakeCamera {
    pub fn spawn(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(10)))
                .unwrap();
            serve(stream, &script)
        });
        Self { port, handle }
    }

    pub fn join(self) -> Captured {
        self.handle.join().unwrap()
    }
}

pub(crate) fn media(media_type: MediaType, payload: &[u8]) -> Vec<u8> {
    let mut header = MediaMessage::new(media_type, 0, payload.len() as u32);
    header.header.timestamp = 0;
    let mut wire = header.to_bytes().unwrap().to_vec();
    wire.extend_from_slice(payload);
    wire
}

pub(crate) fn open_reply() -> Vec<u8> {
    let mut reply = OpenStreamMessage::open(0, 0);
    reply.header.timestamp = 0;
    reply.to_bytes().unwrap().to_vec()
}

fn serve(mut stream: TcpStream, script: &Script) -> Captured {
    let mut captured = Captured::default();

    let mut byte = [0u8; 1];
    while !captured.request.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).unwrap_or(0) == 0 {
            return captured;
        }
        captured.request.push(byte[0]);
    }
    stream.write_all(&script.greeting).unwrap();

    let mut auth = [0u8; AuthMessage::WIRE_SIZE];
    if stream.read_exact(&mut auth).is_err() {
        return captured;
    }
    captured.auth = AuthMessage::decode(&auth).ok();

    match script.auth {
        AuthBehavior::Accept => {
            stream.write_all(&auth_reply(true)).unwrap();
        }
        AuthBehavior::Reject => {
            stream.write_all(&auth_reply(false)).unwrap();
            drain(&mut stream, &mut captured.trailing);
            return captured;
        }
        AuthBehavior::Silent => {
            drain(&mut stream, &mut captured.trailing);
            return captured;
        }
        AuthBehavior::WrongMessageType => {
            let mut reply = auth_reply(true);
            // Message type byte follows the header and body length.
            reply[14] = 0x04;
            stream.write_all(&reply).unwrap();
            drain(&mut stream, &mut captured.trailing);
            return captured;
        }
    }

    let mut open = [0u8; OpenStreamMessage::WIRE_SIZE];
    if stream.read_exact(&mut open).is_err() {
        return captured;
    }
    captured.open = OpenStreamMessage::decode(&open).ok();

    if script.answer_open {
        stream.write_all(&open_reply()).unwrap();
        // The client may close mid-stream while its queues are full.
        if stream.write_all(&script.media).is_err() {
            return captured;
        }
    }
    if script.hang_up {
        return captured;
    }
    if script.reset {
        std::thread::sleep(Duration::from_millis(300));
        return captured;
    }

    drain(&mut stream, &mut captured.trailing);
    captured
}

fn auth_reply(verified: bool) -> Vec<u8> {
    let mut reply = AuthMessageReply::new(verified, [7u8; AUTH_TOKEN_SIZE]);
    reply.message.header.timestamp = 0;
    reply.to_bytes().unwrap().to_vec()
}

fn drain(stream: &mut TcpStream, out: &mut Vec<u8>) {
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => out.extend_from_slice(&buf[..n]),
        }
    }
}
