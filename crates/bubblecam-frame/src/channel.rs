//! Output channels of the demultiplexer.
//!
//! Every payload byte extracted from the camera stream is routed to exactly
//! one of these. They are unrelated to the camera-side channel/stream ids
//! carried in `OpenStreamMessage`.

/// Category of an extracted payload chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaKind {
    /// H.264 elementary stream bytes (IDR and P slices).
    #[default]
    Video,
    /// G.711 audio bytes.
    Audio,
}

impl MediaKind {
    /// Returns a human-readable name for the channel.
    pub fn name(self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
