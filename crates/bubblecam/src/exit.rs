use std::fmt;
use std::io;

use bubblecam_session::{SessionError, StopReason};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    let code = match &err {
        SessionError::UsernameOrPasswordTooLong { .. } => USAGE,
        SessionError::ConnectionTimeout(source) if source.is_timeout() => TIMEOUT,
        SessionError::ConnectionTimeout(_) => TRANSPORT_ERROR,
        SessionError::ReadTimeout { .. } | SessionError::WriteTimeout { .. } => TIMEOUT,
        SessionError::UnexpectedReply(_) => DATA_INVALID,
        SessionError::AuthenticationFailed(_) => PERMISSION_DENIED,
        SessionError::AlreadyStreaming | SessionError::OpenStreamFailed(_) => FAILURE,
        SessionError::Runtime(_) => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err} (code 0x{:02x})", err.code()))
}

/// Exit code for a session that ran and then stopped.
pub fn stop_code(reason: &StopReason) -> i32 {
    match reason {
        StopReason::Requested => SUCCESS,
        StopReason::Disconnected => FAILURE,
        StopReason::Error(_) => TRANSPORT_ERROR,
    }
}
