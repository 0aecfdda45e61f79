use tracing::debug;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::session::{MediaStreams, Session};

/// Controller allowing at most one active session.
///
/// Dropping the client stops its session.
#[derive(Debug, Default)]
pub struct StreamClient {
    session: Option<Session>,
}

impl StreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start streaming with an explicit config.
    ///
    /// Fails with [`SessionError::AlreadyStreaming`] while a session is
    /// active. A session that already stopped on its own is replaced.
    pub fn start_streaming(&mut self, config: SessionConfig) -> Result<MediaStreams> {
        if self.is_streaming() {
            return Err(SessionError::AlreadyStreaming);
        }
        if let Some(stale) = self.session.take() {
            debug!(peer = %stale.peer_addr(), "replacing stopped session");
            stale.stop();
        }

        let (session, streams) = Session::open(config)?;
        self.session = Some(session);
        Ok(streams)
    }

    /// Start streaming `stream` with the default user and `password`.
    pub fn start_streaming_with_password(
        &mut self,
        host: &str,
        password: &str,
        stream: u32,
    ) -> Result<MediaStreams> {
        self.start_streaming(SessionConfig::with_password(host, password, stream))
    }

    /// Start streaming `stream` with default credentials.
    pub fn start_streaming_stream(&mut self, host: &str, stream: u32) -> Result<MediaStreams> {
        self.start_streaming(SessionConfig::with_stream(host, stream))
    }

    /// Stop the current session, if any.
    pub fn stop_streaming(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
    }

    /// True while a session is running.
    pub fn is_streaming(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_active)
    }

    /// Greeting of the current session.
    pub fn greeting(&self) -> Option<&str> {
        self.session.as_ref().map(Session::greeting)
    }
}
