use std::fmt;
use std::time::Duration;

use bubblecam_frame::ControlPolicy;
use bubblecam_transport::DEFAULT_PORT;

/// Default login name.
pub const DEFAULT_USERNAME: &str = "admin";

/// Chunks each media output holds before the session stops reading the socket.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Per-step time bounds for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Bound on establishing the TCP connection.
    pub connect: Duration,
    /// Bound on each handshake write.
    pub write: Duration,
    /// Bound on waiting for each handshake reply.
    pub reply: Duration,
    /// Period between heartbeats once the stream is open.
    pub heartbeat: Duration,
    /// Bound on sending the close-stream message when stopping.
    pub stop_write: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            write: Duration::from_secs(30),
            reply: Duration::from_secs(5),
            heartbeat: Duration::from_secs(10),
            stop_write: Duration::from_secs(5),
        }
    }
}

/// Everything needed to open a stream from one camera.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Sent in the login package; never logged.
    pub password: String,
    pub channel: u32,
    pub stream: u32,
    pub control_policy: ControlPolicy,
    /// Bound of the video and audio queues, in chunks (minimum 1).
    pub queue_capacity: usize,
    pub timeouts: TimeoutConfig,
}

impl SessionConfig {
    /// Config for `host` with every other field at its default.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: String::new(),
            channel: 0,
            stream: 0,
            control_policy: ControlPolicy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Default user with `password`, streaming `stream` on channel 0.
    pub fn with_password(host: impl Into<String>, password: impl Into<String>, stream: u32) -> Self {
        Self {
            password: password.into(),
            stream,
            ..Self::new(host)
        }
    }

    /// Default credentials, streaming `stream` on channel 0.
    pub fn with_stream(host: impl Into<String>, stream: u32) -> Self {
        Self {
            stream,
            ..Self::new(host)
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .field("channel", &self.channel)
            .field("stream", &self.stream)
            .field("control_policy", &self.control_policy)
            .field("queue_capacity", &self.queue_capacity)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}
