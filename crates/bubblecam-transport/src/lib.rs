//! TCP transport for bubble-protocol cameras.
//!
//! This is the lowest layer of bubblecam. It resolves the camera address,
//! connects with a bounded wait, and hands out a [`CameraStream`] whose read
//! and write timeouts the handshake tunes per step.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::CameraStream;
pub use tcp::{TcpTransport, DEFAULT_PORT};
