/// Errors that can occur during package encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input is shorter than the fixed size of the package.
    #[error("truncated input ({actual} bytes, need {needed})")]
    TruncatedInput { needed: usize, actual: usize },

    /// The package does not start with the 0xAA marker byte.
    #[error("invalid package marker 0x{0:02x} (expected 0xaa)")]
    InvalidMarker(u8),

    /// A credential does not fit its fixed-size field.
    #[error("{field} too long ({len} bytes, max {max})")]
    CredentialTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A decoded credential field is not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidCredential { field: &'static str },

    /// An I/O error occurred while reading or writing packages.
    #[error("package I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed while reading or writing.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, CodecError>;
