//! Record a camera's video stream to a file for a fixed time.
//!
//! Run with:
//!   cargo run --example record -- 192.0.2.10 secret video.h264 10
//!
//! Play the result with any raw H.264 player, e.g. `ffplay video.h264`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Duration;

use bubblecam::{MediaStreams, StreamClient};

const USAGE: &str = "usage: record <host> <password> <out.h264> [seconds]";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().ok_or(USAGE)?;
    let password = args.next().ok_or(USAGE)?;
    let path = args.next().ok_or(USAGE)?;
    let seconds: u64 = args.next().map(|s| s.parse::<u64>()).transpose()?.unwrap_or(10);

    let mut client = StreamClient::new();
    let MediaStreams { mut video, .. } =
        client.start_streaming_with_password(&host, &password, 0)?;
    eprintln!("Streaming from {host}: {}", client.greeting().unwrap_or("").trim_end());

    let mut out = BufWriter::new(File::create(&path)?);
    let writer = std::thread::spawn(move || -> std::io::Result<u64> {
        let mut written = 0u64;
        while let Some(chunk) = video.blocking_recv() {
            out.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        out.flush()?;
        Ok(written)
    });

    std::thread::sleep(Duration::from_secs(seconds));
    client.stop_streaming();

    let written = writer.join().map_err(|_| "writer thread panicked")??;
    eprintln!("Wrote {written} bytes of H.264 to {path}");
    Ok(())
}
