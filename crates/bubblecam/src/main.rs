mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "bubblecam", version, about = "Bubble protocol IP camera client")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). `BUBBLECAM_LOG` takes precedence.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stream_subcommand() {
        let cli = Cli::try_parse_from([
            "bubblecam",
            "stream",
            "192.0.2.10",
            "--password",
            "secret",
            "--video",
            "out.h264",
            "--duration",
            "10s",
        ])
        .expect("stream args should parse");

        let Command::Stream(args) = cli.command else {
            panic!("expected stream command");
        };
        assert_eq!(args.camera.host, "192.0.2.10");
        assert_eq!(args.camera.user, "admin");
        assert_eq!(args.camera.port, 80);
        assert_eq!(args.duration.as_deref(), Some("10s"));
        assert!(args.audio.is_none());
    }

    #[test]
    fn parses_probe_with_global_flags() {
        let cli = Cli::try_parse_from([
            "bubblecam",
            "probe",
            "cam.local",
            "--port",
            "8080",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("probe args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        let Command::Probe(args) = cli.command else {
            panic!("expected probe command");
        };
        assert_eq!(args.camera.port, 8080);
    }

    #[test]
    fn parses_demux_from_stdin() {
        let cli = Cli::try_parse_from([
            "bubblecam",
            "demux",
            "-",
            "--audio",
            "audio.g711",
            "--discard-control",
        ])
        .expect("demux args should parse");

        let Command::Demux(args) = cli.command else {
            panic!("expected demux command");
        };
        assert_eq!(args.input.to_str(), Some("-"));
        assert_eq!(args.audio.as_deref().and_then(|p| p.to_str()), Some("audio.g711"));
        assert!(args.video.is_none());
        assert!(args.discard_control);
    }

    #[test]
    fn rejects_unknown_format() {
        let err = Cli::try_parse_from(["bubblecam", "--format", "table", "version"])
            .expect_err("table is not a supported format");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
