use std::path::PathBuf;
use std::time::Duration;

use bubblecam_frame::ControlPolicy;
use bubblecam_session::{SessionConfig, TimeoutConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_USERNAME};
use bubblecam_transport::DEFAULT_PORT;
use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod demux;
pub mod probe;
pub mod stream;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream video and audio to files or stdout.
    Stream(StreamArgs),
    /// Run the handshake, print the camera greeting and close.
    Probe(ProbeArgs),
    /// Split a captured media stream into video and audio files.
    Demux(DemuxArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Stream(args) => stream::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Demux(args) => demux::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Connection options shared by every camera command.
#[derive(Args, Debug)]
pub struct CameraArgs {
    /// Camera host name or address.
    #[arg(env = "BUBBLECAM_HOST")]
    pub host: String,
    /// Camera TCP port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Login name (at most 20 bytes).
    #[arg(long, short = 'u', env = "BUBBLECAM_USER", default_value = DEFAULT_USERNAME)]
    pub user: String,
    /// Login password (at most 20 bytes).
    #[arg(long, short = 'p', env = "BUBBLECAM_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
    /// Camera channel to open.
    #[arg(long, default_value_t = 0)]
    pub channel: u32,
    /// Stream on the channel (0 is usually the main stream).
    #[arg(long, default_value_t = 0)]
    pub stream: u32,
    /// Connect timeout (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub connect_timeout: String,
    /// Timeout for each handshake reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub reply_timeout: String,
    /// Heartbeat period while streaming (e.g. 10s).
    #[arg(long, default_value = "10s")]
    pub heartbeat: String,
    /// Drop control packages found in the media stream instead of passing
    /// their marker byte through to the active channel.
    #[arg(long)]
    pub discard_control: bool,
}

impl CameraArgs {
    pub fn to_config(&self) -> CliResult<SessionConfig> {
        let timeouts = TimeoutConfig {
            connect: parse_duration(&self.connect_timeout)?,
            reply: parse_duration(&self.reply_timeout)?,
            heartbeat: parse_duration(&self.heartbeat)?,
            ..TimeoutConfig::default()
        };
        let control_policy = control_policy(self.discard_control);

        Ok(SessionConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.user.clone(),
            password: self.password.clone(),
            channel: self.channel,
            stream: self.stream,
            control_policy,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeouts,
        })
    }
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    #[command(flatten)]
    pub camera: CameraArgs,
    /// Write video to FILE ("-" for stdout).
    #[arg(long, value_name = "FILE")]
    pub video: Option<PathBuf>,
    /// Write audio to FILE ("-" for stdout).
    #[arg(long, value_name = "FILE")]
    pub audio: Option<PathBuf>,
    /// Stop after this long (e.g. 30s, 500ms). Default: until Ctrl-C.
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub camera: CameraArgs,
}

#[derive(Args, Debug)]
pub struct DemuxArgs {
    /// Bytes the camera sent after the handshake ("-" for stdin).
    #[arg(value_name = "CAPTURE")]
    pub input: PathBuf,
    /// Write video to FILE ("-" for stdout).
    #[arg(long, value_name = "FILE")]
    pub video: Option<PathBuf>,
    /// Write audio to FILE ("-" for stdout).
    #[arg(long, value_name = "FILE")]
    pub audio: Option<PathBuf>,
    /// Drop control packages instead of passing their marker byte through.
    #[arg(long)]
    pub discard_control: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn control_policy(discard_control: bool) -> ControlPolicy {
    if discard_control {
        ControlPolicy::Discard
    } else {
        ControlPolicy::LeakMarkerByte
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
