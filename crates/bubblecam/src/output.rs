use std::io::{IsTerminal, Write};

use bubblecam_session::SessionStats;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsOutput {
    pub video_bytes: u64,
    pub audio_bytes: u64,
    pub heartbeats_sent: u64,
    pub control_packages: u64,
    pub anomalies: u64,
}

impl From<SessionStats> for StatsOutput {
    fn from(stats: SessionStats) -> Self {
        Self {
            video_bytes: stats.video_bytes,
            audio_bytes: stats.audio_bytes,
            heartbeats_sent: stats.heartbeats_sent,
            control_packages: stats.control_packages,
            anomalies: stats.anomalies,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ProbeOutput {
    pub host: String,
    pub peer: String,
    pub greeting: String,
    pub channel: u32,
    pub stream: u32,
    pub connected: bool,
}

#[derive(Serialize, Debug)]
pub struct StreamOutput {
    pub peer: String,
    pub stop_reason: String,
    pub stats: StatsOutput,
    pub video_written: u64,
    pub audio_written: u64,
}

#[derive(Serialize, Debug)]
pub struct DemuxOutput {
    pub input: String,
    pub video_bytes: u64,
    pub audio_bytes: u64,
    pub media_frames: u64,
    pub control_packages: u64,
    pub anomalies: u64,
    pub video_written: u64,
    pub audio_written: u64,
}

pub fn print_probe(out: &ProbeOutput, format: OutputFormat) {
    let mut stdout = std::io::stdout();
    match format {
        OutputFormat::Json => write_json(&mut stdout, out),
        OutputFormat::Pretty => {
            let _ = writeln!(stdout, "Camera:");
            let _ = writeln!(stdout, "  Host:      {}", out.host);
            let _ = writeln!(stdout, "  Peer:      {}", out.peer);
            let _ = writeln!(stdout, "  Channel:   {}", out.channel);
            let _ = writeln!(stdout, "  Stream:    {}", out.stream);
            let _ = writeln!(stdout, "  Greeting:  {}", first_line(&out.greeting));
        }
    }
}

/// Write the stream summary to `sink`, which is stderr when stdout carries media.
pub fn print_stream(sink: &mut dyn Write, out: &StreamOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => write_json(sink, out),
        OutputFormat::Pretty => {
            let _ = writeln!(sink, "Stream from {} stopped ({})", out.peer, out.stop_reason);
            let _ = writeln!(
                sink,
                "  Video:       {} bytes ({} written)",
                out.stats.video_bytes, out.video_written
            );
            let _ = writeln!(
                sink,
                "  Audio:       {} bytes ({} written)",
                out.stats.audio_bytes, out.audio_written
            );
            let _ = writeln!(sink, "  Heartbeats:  {}", out.stats.heartbeats_sent);
            let _ = writeln!(
                sink,
                "  Control:     {} packages, {} anomalies",
                out.stats.control_packages, out.stats.anomalies
            );
        }
    }
}

pub fn print_demux(sink: &mut dyn Write, out: &DemuxOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => write_json(sink, out),
        OutputFormat::Pretty => {
            let _ = writeln!(sink, "Capture {}:", out.input);
            let _ = writeln!(
                sink,
                "  Video:    {} bytes ({} written)",
                out.video_bytes, out.video_written
            );
            let _ = writeln!(
                sink,
                "  Audio:    {} bytes ({} written)",
                out.audio_bytes, out.audio_written
            );
            let _ = writeln!(sink, "  Frames:   {}", out.media_frames);
            let _ = writeln!(
                sink,
                "  Control:  {} packages, {} anomalies",
                out.control_packages, out.anomalies
            );
        }
    }
}

fn write_json<T: Serialize>(sink: &mut dyn Write, value: &T) {
    let line = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    let _ = writeln!(sink, "{line}");
    let _ = sink.flush();
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
