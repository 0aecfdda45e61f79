use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Environment variable that overrides `--log-level` (e.g. `BUBBLECAM_LOG=debug`).
pub const LOG_ENV: &str = "BUBBLECAM_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Level from `BUBBLECAM_LOG` when set and valid, else the flag value.
fn effective_filter(flag: LogLevel, env: Option<&str>) -> LevelFilter {
    env.and_then(|value| value.trim().parse::<LevelFilter>().ok())
        .unwrap_or_else(|| flag.into())
}

/// Install the stderr subscriber. Stdout stays free for media and results.
///
/// Wire hex dumps are emitted at `debug`, so `info` is quiet while streaming.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let env = std::env::var(LOG_ENV).ok();
    let filter = effective_filter(level, env.as_deref());

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(filter)
        .with_ansi(false)
        .with_target(filter >= LevelFilter::DEBUG)
        .with_thread_names(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().flatten_event(true).try_init();
        }
    }
}
