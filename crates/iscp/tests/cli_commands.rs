#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use iscp::frame::{decode_frame, encode_frame, Message, Protocol, DEFAULT_MAX_PAYLOAD};

fn iscp(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_iscp"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .env_remove("ISCP_DEVICE")
        .env_remove("ISCP_COMMANDS")
        .output()
        .expect("iscp should run")
}

fn eiscp(code: &str) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(
        Protocol::Eiscp,
        &Message::parse_wire(code).expect("valid wire code"),
        &mut buf,
    )
    .expect("frame should encode");
    buf.to_vec()
}

/// A receiver that echoes every command it gets, the way real units report
/// the new state after a change. Returns the codes it received.
fn echoing_receiver(expected: usize) -> (SocketAddr, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept should succeed");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set timeout");
        let mut received = Vec::new();
        let mut buf = BytesMut::new();
        let mut chunk = [0u8; 256];

        while received.len() < expected {
            while let Some(decoded) =
                decode_frame(Protocol::Eiscp, &mut buf, DEFAULT_MAX_PAYLOAD).expect("valid frame")
            {
                let code = decoded.message.to_string();
                stream.write_all(&eiscp(&code)).expect("echo should succeed");
                received.push(code);
            }
            if received.len() >= expected {
                break;
            }
            let n = stream.read(&mut chunk).expect("read should succeed");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        received
    });

    (addr, handle)
}

#[test]
fn send_transmits_in_order_and_prints_replies() {
    let (addr, receiver) = echoing_receiver(2);
    let device = addr.to_string();

    let output = iscp(&["send", "power on", "volume up", "--device", &device]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {stderr}");
    assert_eq!(receiver.join().expect("receiver thread"), ["PWR01", "MVLUP"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "stdout: {stdout}");
    assert!(lines[0].contains("\"code\":\"PWR01\""));
    assert!(lines[1].contains("\"code\":\"MVLUP\""));
    assert!(lines[0].contains(&format!("\"device\":\"{device}\"")));
}

#[test]
fn send_times_out_when_receiver_stays_silent() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let device = listener.local_addr().expect("local addr").to_string();
    let holder = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept should succeed");
        thread::sleep(Duration::from_millis(800));
        drop(stream);
    });

    let output = iscp(&["send", "PWRQSTN", "--device", &device, "--wait", "200ms"]);
    holder.join().expect("holder thread");

    assert_eq!(output.status.code(), Some(124));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unacknowledged"));
}

#[test]
fn unknown_command_is_a_usage_error_without_connecting() {
    // Nothing listens here; the command must fail before any connect attempt.
    let output = iscp(&["send", "make coffee", "--device", "127.0.0.1:9"]);

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown command"));
}

#[test]
fn listen_prints_unsolicited_messages() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let device = listener.local_addr().expect("local addr").to_string();
    let pusher = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept should succeed");
        let mut burst = eiscp("MVL2A");
        burst.extend(eiscp("NLSC0-P"));
        stream.write_all(&burst).expect("write should succeed");
        thread::sleep(Duration::from_millis(500));
    });

    let output = iscp(&["listen", "--device", &device, "--count", "2"]);
    pusher.join().expect("pusher thread");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"code\":\"MVL2A\""));
    assert!(stdout.contains("\"argument\":\"C0-P\""));
}

#[test]
fn listen_reports_closed_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let device = listener.local_addr().expect("local addr").to_string();
    let closer = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept should succeed");
        drop(stream);
    });

    let output = iscp(&["listen", "--device", &device]);
    closer.join().expect("closer thread");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connection closed"));
}

#[test]
fn discover_prints_first_responder() {
    let responder = UdpSocket::bind("127.0.0.1:0").expect("bind should succeed");
    let target = responder.local_addr().expect("local addr").to_string();
    let handle = thread::spawn(move || {
        let mut buf = [0u8; 64];
        let (_, from) = responder.recv_from(&mut buf).expect("query should arrive");
        responder
            .send_to(&eiscp("ECNTX-NR609/60128/DX/0009B0123456"), from)
            .expect("reply should send");
    });

    let output = iscp(&["discover", "--target", &target, "--timeout", "3s"]);
    handle.join().expect("responder thread");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"model\":\"TX-NR609\""));
    assert!(stdout.contains("\"port\":60128"));
    assert!(stdout.contains("\"identifier\":\"0009B0123456\""));
}

#[test]
fn discover_timeout_returns_124() {
    let silent = UdpSocket::bind("127.0.0.1:0").expect("bind should succeed");
    let target = silent.local_addr().expect("local addr").to_string();

    let output = iscp(&["discover", "--target", &target, "--timeout", "200ms"]);

    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn commands_lists_builtin_and_file_entries() {
    let path = std::env::temp_dir().join(format!("iscp-cli-commands-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"movie night": "LMD02"}"#).expect("write commands file");
    let path_arg = path.to_string_lossy().to_string();

    let output = iscp(&["commands", "--commands", &path_arg]);
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r#"{"phrase":"power on","code":"PWR01"}"#));
    assert!(stdout.contains(r#"{"phrase":"movie night","code":"LMD02"}"#));
}

#[test]
fn malformed_commands_file_is_data_invalid() {
    let path = std::env::temp_dir().join(format!("iscp-cli-bad-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"loud": "mvl50"}"#).expect("write commands file");
    let path_arg = path.to_string_lossy().to_string();

    let output = iscp(&["commands", "--commands", &path_arg]);
    let _ = std::fs::remove_file(&path);

    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn version_prints_package_version() {
    let output = iscp(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("iscp {}", env!("CARGO_PKG_VERSION"))
    );
}
