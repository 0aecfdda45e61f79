use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use bubblecam_frame::{CodecError, MediaKind, MediaReader};
use tracing::{debug, info};

use crate::cmd::stream::{is_stdout, open_sink, Sink};
use crate::cmd::{control_policy, DemuxArgs};
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_demux, DemuxOutput, OutputFormat};

pub fn run(args: DemuxArgs, format: OutputFormat) -> CliResult<i32> {
    let video_to_stdout = is_stdout(args.video.as_deref());
    let audio_to_stdout = is_stdout(args.audio.as_deref());
    if video_to_stdout && audio_to_stdout {
        return Err(CliError::new(
            USAGE,
            "video and audio cannot both be written to stdout",
        ));
    }

    let input = open_input(&args.input)?;
    let mut video = open_sink(args.video.as_deref())?;
    let mut audio = open_sink(args.audio.as_deref())?;

    let mut reader = MediaReader::with_policy(input, control_policy(args.discard_control));
    let (video_written, audio_written) = split(&mut reader, &mut video, &mut audio)?;
    let stats = reader.state().stats();
    info!(
        video_bytes = stats.video_bytes,
        audio_bytes = stats.audio_bytes,
        frames = stats.media_frames,
        "capture demultiplexed"
    );

    let out = DemuxOutput {
        input: args.input.display().to_string(),
        video_bytes: stats.video_bytes,
        audio_bytes: stats.audio_bytes,
        media_frames: stats.media_frames,
        control_packages: stats.control_packages,
        anomalies: stats.anomalies,
        video_written,
        audio_written,
    };
    if video_to_stdout || audio_to_stdout {
        print_demux(&mut io::stderr(), &out, format);
    } else {
        print_demux(&mut io::stdout(), &out, format);
    }
    Ok(SUCCESS)
}

fn open_input(path: &Path) -> CliResult<Box<dyn Read>> {
    if is_stdout(Some(path)) {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path)
        .map_err(|err| io_error(&format!("cannot open {}", path.display()), err))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Copy every chunk to the sink of its kind until the capture ends.
/// Returns the bytes written to video and audio.
fn split<R: Read>(
    reader: &mut MediaReader<R>,
    video: &mut Option<Sink>,
    audio: &mut Option<Sink>,
) -> CliResult<(u64, u64)> {
    let mut written = (0u64, 0u64);
    loop {
        let chunk = match reader.read_chunk() {
            Ok(chunk) => chunk,
            Err(CodecError::ConnectionClosed) => break,
            Err(CodecError::Io(err)) => return Err(io_error("reading capture failed", err)),
            Err(err) => return Err(CliError::new(DATA_INVALID, err.to_string())),
        };
        let (sink, count) = match chunk.kind {
            MediaKind::Video => (video.as_mut(), &mut written.0),
            MediaKind::Audio => (audio.as_mut(), &mut written.1),
        };
        if let Some(sink) = sink {
            sink.write_all(&chunk.data)
                .map_err(|err| io_error(&format!("writing {} failed", chunk.kind), err))?;
            *count += chunk.data.len() as u64;
        }
    }

    for (kind, sink) in [("video", video), ("audio", audio)] {
        if let Some(sink) = sink {
            sink.flush()
                .map_err(|err| io_error(&format!("writing {kind} failed"), err))?;
        }
    }
    debug!(video = written.0, audio = written.1, "outputs flushed");
    Ok(written)
}
