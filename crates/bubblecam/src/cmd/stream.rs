use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bubblecam_session::{MediaStreams, Session, SessionStats, SessionStatus, StopReason};
use tracing::{info, warn};

use crate::cmd::{parse_duration, StreamArgs};
use crate::exit::{io_error, session_error, stop_code, CliError, CliResult, INTERNAL, USAGE};
use crate::output::{print_stream, OutputFormat, StatsOutput, StreamOutput};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) type Sink = Box<dyn Write + Send>;
type Writer = JoinHandle<io::Result<u64>>;

pub fn run(args: StreamArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.camera.to_config()?;
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;

    let video_to_stdout = is_stdout(args.video.as_deref());
    let audio_to_stdout = is_stdout(args.audio.as_deref());
    if video_to_stdout && audio_to_stdout {
        return Err(CliError::new(
            USAGE,
            "video and audio cannot both be written to stdout",
        ));
    }
    let video_sink = open_sink(args.video.as_deref())?;
    let audio_sink = open_sink(args.audio.as_deref())?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (session, streams) =
        Session::open(config).map_err(|err| session_error("stream failed", err))?;
    let MediaStreams {
        mut video,
        mut audio,
        mut status,
    } = streams;
    let peer = session.peer_addr().to_string();
    info!(%peer, greeting = session.greeting().lines().next().unwrap_or(""), "streaming");

    let video_writer = match video_sink {
        Some(sink) => Some(spawn_writer("video", move || video.blocking_recv(), sink)?),
        None => {
            drop(video);
            None
        }
    };
    let audio_writer = match audio_sink {
        Some(sink) => Some(spawn_writer("audio", move || audio.blocking_recv(), sink)?),
        None => {
            drop(audio);
            None
        }
    };

    let deadline = duration.map(|d| Instant::now() + d);
    while running.load(Ordering::SeqCst) && session.is_active() {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        if writer_finished(&video_writer) || writer_finished(&audio_writer) {
            warn!("output closed, stopping");
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    session.stop();

    let video_written = join_writer("video", video_writer)?;
    let audio_written = join_writer("audio", audio_writer)?;

    let (reason, stats) = match status.blocking_recv() {
        Some(SessionStatus::Stopped { reason, stats }) => (reason, stats),
        Some(_) | None => (
            StopReason::Error("session ended without a status report".to_string()),
            SessionStats::default(),
        ),
    };

    let out = StreamOutput {
        peer,
        stop_reason: reason.to_string(),
        stats: StatsOutput::from(stats),
        video_written,
        audio_written,
    };
    if video_to_stdout || audio_to_stdout {
        print_stream(&mut io::stderr(), &out, format);
    } else {
        print_stream(&mut io::stdout(), &out, format);
    }

    Ok(stop_code(&reason))
}

pub(crate) fn is_stdout(path: Option<&Path>) -> bool {
    path.is_some_and(|path| path == Path::new("-"))
}

pub(crate) fn open_sink(path: Option<&Path>) -> CliResult<Option<Sink>> {
    let Some(path) = path else {
        return Ok(None);
    };
    if is_stdout(Some(path)) {
        return Ok(Some(Box::new(BufWriter::new(io::stdout()))));
    }
    let file = File::create(path)
        .map_err(|err| io_error(&format!("cannot create {}", path.display()), err))?;
    Ok(Some(Box::new(BufWriter::new(file))))
}

fn spawn_writer<B, F>(kind: &'static str, mut next: F, mut sink: Sink) -> CliResult<Writer>
where
    B: AsRef<[u8]>,
    F: FnMut() -> Option<B> + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("bubblecam-{kind}-sink"))
        .spawn(move || {
            let mut written = 0u64;
            while let Some(chunk) = next() {
                let chunk = chunk.as_ref();
                sink.write_all(chunk)?;
                written += chunk.len() as u64;
            }
            sink.flush()?;
            Ok(written)
        })
        .map_err(|err| io_error("cannot start output thread", err))
}

fn writer_finished(writer: &Option<Writer>) -> bool {
    writer.as_ref().is_some_and(JoinHandle::is_finished)
}

fn join_writer(kind: &str, writer: Option<Writer>) -> CliResult<u64> {
    let Some(writer) = writer else {
        return Ok(0);
    };
    match writer.join() {
        Ok(Ok(written)) => Ok(written),
        Ok(Err(err)) => Err(io_error(&format!("writing {kind} failed"), err)),
        Err(_) => Err(CliError::new(INTERNAL, format!("{kind} output thread panicked"))),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_means_stdout() {
        assert!(is_stdout(Some(Path::new("-"))));
        assert!(!is_stdout(Some(Path::new("video.h264"))));
        assert!(!is_stdout(None));
    }

    #[test]
    fn writer_counts_bytes() {
        let mut chunks = vec![b"abc".to_vec(), b"de".to_vec()].into_iter();
        let writer = spawn_writer("video", move || chunks.next(), Box::new(io::sink())).unwrap();
        assert_eq!(join_writer("video", Some(writer)).unwrap(), 5);
    }

    #[test]
    fn missing_writer_wrote_nothing() {
        assert_eq!(join_writer("audio", None).unwrap(), 0);
        assert!(!writer_finished(&None));
    }

    #[test]
    fn open_sink_reports_bad_path() {
        let err = open_sink(Some(Path::new("/nonexistent-dir/video.h264")))
            .err()
            .unwrap();
        assert_eq!(err.code, crate::exit::USAGE);
    }
}
