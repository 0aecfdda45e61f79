//! Streaming sessions with bubble protocol cameras.
//!
//! This is the "just works" layer: connect, authenticate, open a stream and
//! receive demultiplexed video and audio on channels, with heartbeats and
//! shutdown handled for you.

pub mod client;
pub mod config;
pub mod error;
pub mod handshake;
pub mod heartbeat;
pub mod session;

#[cfg(test)]
pub(crate) mod fake_camera;

pub use client::StreamClient;
pub use config::{SessionConfig, TimeoutConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_USERNAME};
pub use error::{Result, SessionError};
pub use handshake::{handshake, Handshake, HandshakeState, OpenedStream, REQUEST_LINE};
pub use heartbeat::HeartbeatScheduler;
pub use session::{MediaStreams, Session, SessionStats, SessionStatus, StopReason};
