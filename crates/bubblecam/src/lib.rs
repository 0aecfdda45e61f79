//! Client for the bubble streaming protocol spoken by a family of IP cameras.
//!
//! One TCP connection carries a short login handshake followed by
//! interleaved H.264 video and G.711 audio. This crate connects,
//! authenticates, keeps the stream alive and hands you the two payload
//! streams as ordered byte chunks. Payloads are not decoded.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connection with bounded connect and I/O timeouts
//! - [`frame`]: package codec and media stream demultiplexer
//! - [`session`]: handshake, heartbeat and the streaming session
//!
//! ```no_run
//! use bubblecam::{Session, SessionConfig};
//!
//! let (session, mut streams) = Session::open(SessionConfig::with_password("192.0.2.10", "secret", 0))?;
//! while let Some(chunk) = streams.video.blocking_recv() {
//!     // write `chunk` somewhere
//!     # let _ = chunk;
//! }
//! session.stop();
//! # Ok::<(), bubblecam::SessionError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use bubblecam_transport::*;
}

/// Re-export codec and demultiplexer types.
pub mod frame {
    pub use bubblecam_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use bubblecam_session::*;
}

pub use bubblecam_session::{
    MediaStreams, Session, SessionConfig, SessionError, SessionStats, SessionStatus, StopReason,
    StreamClient, TimeoutConfig,
};
