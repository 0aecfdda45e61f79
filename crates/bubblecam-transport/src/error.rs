/// Errors that can occur in camera transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host name could not be resolved.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },

    /// The host name resolved to no usable address.
    #[error("no address found for {host}")]
    NoAddress { host: String },

    /// Failed to connect to the camera.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True when the failure was a timeout rather than a hard error.
    pub fn is_timeout(&self) -> bool {
        let source = match self {
            TransportError::Resolve { source, .. }
            | TransportError::Connect { source, .. }
            | TransportError::Io(source) => source,
            TransportError::NoAddress { .. } => return false,
        };
        matches!(
            source.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        )
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
