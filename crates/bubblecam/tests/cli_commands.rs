#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bubblecam::frame::{
    AuthMessage, AuthMessageReply, MediaMessage, MediaType, OpenStreamMessage, Package,
    AUTH_TOKEN_SIZE,
};

const GREETING: &[u8] = b"HTTP/1.1 200 OK\r\nServer: bubble\r\n\r\n";
const VIDEO_PAYLOAD: &[u8] = b"\x00\x00\x00\x01\x65slice-data";

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/bubblecam-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn bubblecam(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bubblecam"))
        .args(args)
        .env_remove("BUBBLECAM_HOST")
        .env_remove("BUBBLECAM_USER")
        .env_remove("BUBBLECAM_PASSWORD")
        .env_remove("BUBBLECAM_LOG")
        .output()
        .expect("bubblecam should run")
}

fn auth_reply(verified: bool) -> Vec<u8> {
    let mut reply = AuthMessageReply::new(verified, [7u8; AUTH_TOKEN_SIZE]);
    reply.message.header.timestamp = 0;
    reply.to_bytes().expect("reply encodes").to_vec()
}

fn open_reply() -> Vec<u8> {
    let mut reply = OpenStreamMessage::open(0, 0);
    reply.header.timestamp = 0;
    reply.to_bytes().expect("reply encodes").to_vec()
}

fn video_package(payload: &[u8]) -> Vec<u8> {
    media_package(MediaType::Idr, payload)
}

fn media_package(media_type: MediaType, payload: &[u8]) -> Vec<u8> {
    let mut header = MediaMessage::new(media_type, 0, payload.len() as u32);
    header.header.timestamp = 0;
    let mut wire = header.to_bytes().expect("media header encodes").to_vec();
    wire.extend_from_slice(payload);
    wire
}

/// Serves one client: greeting, auth reply, open reply plus `media`, then
/// reads until the client goes away. Returns the username the client sent.
fn spawn_camera(accept_login: bool, media: Vec<u8>) -> (u16, JoinHandle<Option<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let port = listener.local_addr().expect("local addr").port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().ok()?;
        stream.set_read_timeout(Some(Duration::from_secs(10))).ok()?;

        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            if stream.read(&mut byte).ok()? == 0 {
                return None;
            }
            request.push(byte[0]);
        }
        stream.write_all(GREETING).ok()?;

        let mut auth = [0u8; AuthMessage::WIRE_SIZE];
        stream.read_exact(&mut auth).ok()?;
        let username = AuthMessage::decode(&auth).ok()?.username;

        stream.write_all(&auth_reply(accept_login)).ok()?;
        if accept_login {
            let mut open = [0u8; OpenStreamMessage::WIRE_SIZE];
            stream.read_exact(&mut open).ok()?;
            stream.write_all(&open_reply()).ok()?;
            stream.write_all(&media).ok()?;
        }
        drain(&mut stream);
        Some(username)
    });
    (port, handle)
}

fn drain(stream: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    while let Ok(n) = stream.read(&mut buf) {
        if n == 0 {
            break;
        }
    }
}

#[test]
fn version_prints_package_version() {
    let output = bubblecam(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("bubblecam {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_extended_lists_transport() {
    let output = bubblecam(&["version", "--extended"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("transport: tcp"), "stdout: {stdout}");
    assert!(stdout.contains("default_port: 80"), "stdout: {stdout}");
}

#[test]
fn probe_reports_greeting_as_json() {
    let (port, camera) = spawn_camera(true, Vec::new());
    let port = port.to_string();

    let output = bubblecam(&[
        "probe", "127.0.0.1", "--port", &port, "--user", "viewer", "--password", "pw", "--format",
        "json",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("probe output should be json");
    assert_eq!(json["connected"], true);
    assert_eq!(json["host"], "127.0.0.1");
    assert!(json["greeting"]
        .as_str()
        .is_some_and(|g| g.starts_with("HTTP/1.1 200 OK")));

    assert_eq!(camera.join().expect("camera thread").as_deref(), Some("viewer"));
}

#[test]
fn rejected_login_exits_permission_denied() {
    let (port, camera) = spawn_camera(false, Vec::new());
    let port = port.to_string();

    let output = bubblecam(&["probe", "127.0.0.1", "--port", &port, "--password", "wrong"]);
    assert_eq!(output.status.code(), Some(50));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("code 0x80"), "stderr: {stderr}");

    camera.join().expect("camera thread");
}

#[test]
fn long_username_is_a_usage_error() {
    let output = bubblecam(&["probe", "127.0.0.1", "--port", "9", "--user", "abcdefghijklmnopqrstu"]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("code 0x02"), "stderr: {stderr}");
}

#[test]
fn refused_connection_is_a_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        listener.local_addr().expect("local addr").port()
    };
    let port = port.to_string();

    let output = bubblecam(&["probe", "127.0.0.1", "--port", &port, "--connect-timeout", "2s"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn stream_writes_video_payload_to_file() {
    let dir = unique_temp_dir("stream");
    let video_path = dir.join("video.h264");
    let (port, camera) = spawn_camera(true, video_package(VIDEO_PAYLOAD));
    let port = port.to_string();

    let output = bubblecam(&[
        "stream",
        "127.0.0.1",
        "--port",
        &port,
        "--video",
        video_path.to_str().expect("utf-8 temp path"),
        "--duration",
        "300ms",
        "--discard-control",
        "--format",
        "json",
    ]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let video = std::fs::read(&video_path).expect("video file should exist");
    assert_eq!(video, VIDEO_PAYLOAD);

    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("summary should be json");
    assert_eq!(summary["stop_reason"], "requested");
    assert_eq!(summary["video_written"], VIDEO_PAYLOAD.len() as u64);

    assert_eq!(camera.join().expect("camera thread").as_deref(), Some("admin"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn stream_rejects_both_outputs_on_stdout() {
    let output = bubblecam(&["stream", "127.0.0.1", "--video", "-", "--audio", "-"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn demux_splits_capture_file() {
    let dir = unique_temp_dir("demux");
    let capture_path = dir.join("capture.bin");
    let video_path = dir.join("video.h264");
    let audio_path = dir.join("audio.g711");

    let mut capture = open_reply();
    capture.extend(video_package(VIDEO_PAYLOAD));
    capture.extend(media_package(MediaType::Audio, b"\xd5\xd5\x55"));
    capture.extend(video_package(b"tail"));
    std::fs::write(&capture_path, &capture).expect("capture should be writable");

    let output = bubblecam(&[
        "demux",
        capture_path.to_str().expect("utf-8 temp path"),
        "--video",
        video_path.to_str().expect("utf-8 temp path"),
        "--audio",
        audio_path.to_str().expect("utf-8 temp path"),
        "--discard-control",
        "--format",
        "json",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let mut expected_video = VIDEO_PAYLOAD.to_vec();
    expected_video.extend_from_slice(b"tail");
    assert_eq!(std::fs::read(&video_path).expect("video file"), expected_video);
    assert_eq!(std::fs::read(&audio_path).expect("audio file"), b"\xd5\xd5\x55");

    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("summary should be json");
    assert_eq!(summary["video_written"], expected_video.len() as u64);
    assert_eq!(summary["audio_written"], 3);
    assert_eq!(summary["control_packages"], 1);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn demux_missing_capture_is_a_usage_error() {
    let output = bubblecam(&["demux", "/nonexistent-dir/capture.bin"]);
    assert_eq!(output.status.code(), Some(64));
}
