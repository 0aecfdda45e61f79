//! Streaming session lifecycle.
//!
//! [`Session::start`] runs the blocking handshake on the caller's thread,
//! then hands the socket to a dedicated thread running a current-thread
//! tokio runtime. One task multiplexes inbound media, the heartbeat
//! interval and the stop token. Video and audio chunks are delivered on
//! bounded channels in arrival order; while a queue is full the session
//! stops reading the socket and TCP flow control holds the camera back.
//! The session reports its end on the status channel exactly once.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use bubblecam_frame::{
    ControlPolicy, DemuxCodec, MediaChunk, MediaKind, OpenStreamMessage, Package,
};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{SessionConfig, TimeoutConfig};
use crate::error::{Result, SessionError};
use crate::handshake::{handshake, OpenedStream};
use crate::heartbeat::HeartbeatScheduler;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `stop` was called or the session was dropped.
    Requested,
    /// The camera closed the connection.
    Disconnected,
    /// A socket or heartbeat error ended the session.
    Error(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Requested => f.write_str("requested"),
            StopReason::Disconnected => f.write_str("disconnected"),
            StopReason::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Final counters of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub video_bytes: u64,
    pub audio_bytes: u64,
    pub heartbeats_sent: u64,
    pub control_packages: u64,
    pub anomalies: u64,
}

/// Notifications on the status channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStatus {
    /// The session ended. Sent exactly once, after the socket is released.
    Stopped {
        reason: StopReason,
        stats: SessionStats,
    },
}

/// Consumer ends of a session's outputs.
///
/// Dropping `video` or `audio` discards that output without slowing the
/// other one.
#[derive(Debug)]
pub struct MediaStreams {
    pub video: Receiver<Bytes>,
    pub audio: Receiver<Bytes>,
    pub status: Receiver<SessionStatus>,
}

struct Outputs {
    video: Sender<Bytes>,
    audio: Sender<Bytes>,
    status: Sender<SessionStatus>,
}

impl Outputs {
    fn new(capacity: usize) -> (Self, MediaStreams) {
        let capacity = capacity.max(1);
        let (video_tx, video) = channel(capacity);
        let (audio_tx, audio) = channel(capacity);
        // Carries the single Stopped report.
        let (status_tx, status) = channel(1);
        let outputs = Self {
            video: video_tx,
            audio: audio_tx,
            status: status_tx,
        };
        (outputs, MediaStreams {
            video,
            audio,
            status,
        })
    }

    fn sender(&self, kind: MediaKind) -> &Sender<Bytes> {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    /// Queue `chunk` if there is room. Hands it back when the queue is full.
    fn offer(&self, chunk: MediaChunk) -> Option<MediaChunk> {
        match self.sender(chunk.kind).try_send(chunk.data) {
            Ok(()) => None,
            Err(TrySendError::Full(data)) => {
                debug!(kind = %chunk.kind, "output queue full, pausing reads");
                Some(MediaChunk {
                    kind: chunk.kind,
                    data,
                })
            }
            // Consumers may drop the output they do not need.
            Err(TrySendError::Closed(_)) => None,
        }
    }
}

/// A running camera stream.
///
/// Dropping the session stops it.
#[derive(Debug)]
pub struct Session {
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
    streams: Option<MediaStreams>,
    greeting: String,
    peer: SocketAddr,
    active: Arc<AtomicBool>,
}

impl Session {
    /// Run the handshake and start streaming.
    ///
    /// The outputs are available through [`Session::take_streams`]. Until
    /// they are taken and drained, the session reads at most
    /// `queue_capacity` chunks per output and then leaves the rest in the
    /// socket.
    pub fn start(config: SessionConfig) -> Result<Self> {
        let (mut session, streams) = Self::open(config)?;
        session.streams = Some(streams);
        Ok(session)
    }

    /// Like [`Session::start`], returning the outputs alongside the session.
    pub fn open(config: SessionConfig) -> Result<(Self, MediaStreams)> {
        let opened = handshake(&config)?;
        Self::spawn(opened, &config)
    }

    fn spawn(opened: OpenedStream, config: &SessionConfig) -> Result<(Self, MediaStreams)> {
        let OpenedStream {
            stream,
            greeting,
            channel,
            stream_id,
        } = opened;
        let peer = stream.peer_addr();

        let socket = stream.into_std();
        socket.set_nonblocking(true).map_err(SessionError::Runtime)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SessionError::Runtime)?;

        let (reactor, streams) = Reactor::new(channel, stream_id, config);
        let cancel = reactor.cancel.clone();
        let active = Arc::clone(&reactor.active);

        let thread = std::thread::Builder::new()
            .name("bubblecam-session".to_string())
            .spawn(move || runtime.block_on(reactor.run(socket)))
            .map_err(SessionError::Runtime)?;

        info!(%peer, channel, stream = stream_id, "session started");
        let session = Self {
            cancel,
            thread: Some(thread),
            streams: None,
            greeting,
            peer,
            active,
        };
        Ok((session, streams))
    }

    /// Take the output channels. Returns `None` after the first call.
    pub fn take_streams(&mut self) -> Option<MediaStreams> {
        self.streams.take()
    }

    /// Camera's reply to the request line.
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Address of the camera.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// False once the session has stopped for any reason.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop streaming and wait for the session thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(peer = %self.peer, "session thread panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Reactor {
    channel: u32,
    stream: u32,
    policy: ControlPolicy,
    timeouts: TimeoutConfig,
    cancel: CancellationToken,
    active: Arc<AtomicBool>,
    outputs: Outputs,
}

impl Reactor {
    fn new(channel: u32, stream: u32, config: &SessionConfig) -> (Self, MediaStreams) {
        let (outputs, streams) = Outputs::new(config.queue_capacity);
        let reactor = Self {
            channel,
            stream,
            policy: config.control_policy,
            timeouts: config.timeouts,
            cancel: CancellationToken::new(),
            active: Arc::new(AtomicBool::new(true)),
            outputs,
        };
        (reactor, streams)
    }

    async fn run(self, socket: std::net::TcpStream) {
        match TcpStream::from_std(socket) {
            Ok(socket) => {
                let (reader, writer) = socket.into_split();
                self.serve(reader, writer).await;
            }
            Err(err) => {
                let reason = StopReason::Error(format!("socket registration failed: {err}"));
                self.finish(reason, SessionStats::default()).await;
            }
        }
    }

    async fn serve<R, W>(self, reader: R, writer: W)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (reason, stats) = self.stream_media(reader, writer).await;
        self.finish(reason, stats).await;
    }

    async fn finish(self, reason: StopReason, stats: SessionStats) {
        self.active.store(false, Ordering::SeqCst);
        info!(
            %reason,
            video_bytes = stats.video_bytes,
            audio_bytes = stats.audio_bytes,
            heartbeats = stats.heartbeats_sent,
            "session stopped"
        );
        // The status receiver may already be gone.
        let _ = self
            .outputs
            .status
            .send(SessionStatus::Stopped { reason, stats })
            .await;
    }

    async fn stream_media<R, W>(&self, reader: R, mut writer: W) -> (StopReason, SessionStats)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut media = FramedRead::new(reader, DemuxCodec::with_policy(self.policy));
        let mut heartbeat = HeartbeatScheduler::new(self.timeouts.heartbeat);
        // A chunk waiting for room in its queue. No socket reads meanwhile.
        let mut pending: Option<MediaChunk> = None;

        let reason = loop {
            let pending_kind = pending.as_ref().map(|chunk| chunk.kind);

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break StopReason::Requested,

                _ = heartbeat.tick() => {
                    let sent = tokio::time::timeout(
                        self.timeouts.write,
                        heartbeat.send(&mut writer),
                    )
                    .await;
                    match sent {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            warn!(error = %err, "heartbeat write failed");
                            break StopReason::Error(format!("heartbeat write failed: {err}"));
                        }
                        Err(_) => {
                            warn!(timeout = ?self.timeouts.write, "heartbeat write timed out");
                            break StopReason::Error("heartbeat write timed out".to_string());
                        }
                    }
                }

                permit = self.outputs.sender(pending_kind.unwrap_or_default()).reserve(),
                    if pending_kind.is_some() =>
                {
                    match (permit, pending.take()) {
                        (Ok(permit), Some(chunk)) => permit.send(chunk.data),
                        _ => debug!("output closed, chunk dropped"),
                    }
                }

                next = media.next(), if pending_kind.is_none() => match next {
                    Some(Ok(chunk)) => pending = self.outputs.offer(chunk),
                    Some(Err(err)) => {
                        warn!(error = %err, "camera socket error");
                        break StopReason::Error(err.to_string());
                    }
                    None => {
                        info!("camera closed the connection");
                        break StopReason::Disconnected;
                    }
                },
            }
        };

        self.close_stream(&mut writer).await;

        let demux = media.decoder().state().stats();
        let stats = SessionStats {
            video_bytes: demux.video_bytes,
            audio_bytes: demux.audio_bytes,
            heartbeats_sent: heartbeat.sent(),
            control_packages: demux.control_packages,
            anomalies: demux.anomalies,
        };
        (reason, stats)
    }

    /// Best-effort close-stream message, bounded by the stop write timeout.
    async fn close_stream<W>(&self, writer: &mut W)
    where
        W: AsyncWrite + Unpin,
    {
        let wire = match OpenStreamMessage::close(self.channel, self.stream).to_bytes() {
            Ok(wire) => wire,
            Err(err) => {
                warn!(error = %err, "could not encode close-stream message");
                return;
            }
        };

        let sent = tokio::time::timeout(self.timeouts.stop_write, async {
            writer.write_all(&wire).await?;
            writer.flush().await
        })
        .await;

        match sent {
            Ok(Ok(())) => debug!("close-stream sent"),
            Ok(Err(err)) => debug!(error = %err, "close-stream not sent"),
            Err(_) => debug!(timeout = ?self.timeouts.stop_write, "close-stream timed out"),
        }
    }
}
