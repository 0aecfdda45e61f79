use bubblecam_frame::CodecError;
use bubblecam_transport::TransportError;

/// Errors surfaced synchronously when starting a session.
///
/// Every variant carries a stable numeric code, see [`SessionError::code`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A session is already active on this client.
    #[error("already streaming")]
    AlreadyStreaming,

    /// A credential does not fit the 20-byte wire field.
    #[error("{field} too long ({len} bytes, max {max})")]
    UsernameOrPasswordTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// The TCP connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionTimeout(#[source] TransportError),

    /// A handshake write failed or timed out.
    #[error("write failed during {step}: {source}")]
    WriteTimeout {
        step: &'static str,
        #[source]
        source: CodecError,
    },

    /// No reply arrived in time, or the camera closed the connection.
    #[error("no reply during {step}")]
    ReadTimeout { step: &'static str },

    /// The camera answered with something other than the expected package.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The camera rejected the credentials or never answered the login.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The camera did not answer the open-stream request.
    #[error("open stream failed: {0}")]
    OpenStreamFailed(String),

    /// The session thread or its runtime could not be set up.
    #[error("session runtime error: {0}")]
    Runtime(#[source] std::io::Error),
}

impl SessionError {
    /// Stable numeric error code.
    pub fn code(&self) -> u8 {
        match self {
            SessionError::AlreadyStreaming => 0x01,
            SessionError::UsernameOrPasswordTooLong { .. } => 0x02,
            SessionError::ConnectionTimeout(_) => 0x10,
            SessionError::ReadTimeout { .. } => 0x11,
            SessionError::WriteTimeout { .. } => 0x12,
            SessionError::UnexpectedReply(_) => 0x13,
            SessionError::Runtime(_) => 0x20,
            SessionError::AuthenticationFailed(_) => 0x80,
            SessionError::OpenStreamFailed(_) => 0x81,
        }
    }

    pub(crate) fn from_credential(err: CodecError) -> Self {
        match err {
            CodecError::CredentialTooLong { field, len, max } => {
                SessionError::UsernameOrPasswordTooLong { field, len, max }
            }
            other => SessionError::UnexpectedReply(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
