// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end tests against a live server on a scratch socket: scan and
//! cleanup over the wire, token replay, skip filter, client disconnect
//! mid-cleanup, busy-flag contention, idle timeout and stale-socket
//! recovery.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedReadHalf;
use tokio::net::UnixStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use macsweep::engine::Engine;
use macsweep::protocol::{Request, Response, ResponseKind};
use macsweep::registry::{Registry, ScannerInfo};
use macsweep::report::{CategoryResult, ScanEntry};
use macsweep::safety::Safety;
use macsweep::scan::dir_size;
use macsweep::server::{Server, ServerConfig};

/// A server over two mock scanners rooted in a scratch home:
/// "mock-caches" sees `<home>/caches`, "mock-browser-data" sees
/// `<home>/browser`. Each reports one entry per child directory file.
struct Fixture {
    home: tempfile::TempDir,
    socket: PathBuf,
    shutdown: CancellationToken,
    // dropped last; keeps the socket dir alive
    _socket_dir: tempfile::TempDir,
}

fn mock_scanner(
    root: PathBuf,
    category: &'static str,
    label: &'static str,
    delay: Duration,
) -> impl Fn() -> Result<Vec<CategoryResult>, macsweep::Error> + Send + Sync + 'static {
    move || {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let mut cat = CategoryResult::new(category, label);
        if root.exists() {
            let mut children: Vec<_> = fs::read_dir(&root)
                .unwrap()
                .filter_map(|c| c.ok())
                .map(|c| c.path())
                .collect();
            children.sort();
            for child in children {
                let (size, _) = dir_size(&child);
                let size = if child.is_dir() {
                    size
                } else {
                    child.metadata().map(|m| m.len()).unwrap_or(0)
                };
                let name = child.file_name().unwrap().to_string_lossy().into_owned();
                cat.push_entry(ScanEntry::new(child.display().to_string(), name, size));
            }
        }
        Ok(vec![cat])
    }
}

async fn start_fixture(scanner_delay: Duration, idle_timeout: Duration) -> Fixture {
    let home = tempfile::tempdir().unwrap();
    let socket_dir = tempfile::tempdir().unwrap();
    let socket = socket_dir.path().join("macsweep.sock");

    let mut registry = Registry::new();
    registry.register(
        ScannerInfo::new("mock-caches", "Mock caches", None),
        mock_scanner(
            home.path().join("caches"),
            "mock-caches",
            "Mock caches",
            scanner_delay,
        ),
    );
    registry.register(
        ScannerInfo::new("mock-browser-data", "Mock browser data", None),
        mock_scanner(
            home.path().join("browser"),
            "mock-browser-data",
            "Mock browser data",
            Duration::ZERO,
        ),
    );

    let safety = Safety::with_roots(
        home.path().canonicalize().unwrap(),
        home.path().join("unused-tmp"),
    );
    let engine = Engine::new(registry, safety);
    let server = Server::new(engine, ServerConfig::new(socket.clone()).idle_timeout(idle_timeout));
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // wait for the socket to appear
    for _ in 0..100 {
        if socket.exists() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    Fixture {
        home,
        socket,
        shutdown,
        _socket_dir: socket_dir,
    }
}

/// 1024 bytes under caches/, 2048 under browser/, 3072 in total.
fn seed_standard_home(home: &Path) {
    let caches = home.join("caches");
    fs::create_dir_all(&caches).unwrap();
    fs::write(caches.join("cache-blob"), vec![0u8; 1024]).unwrap();
    let browser = home.join("browser");
    fs::create_dir_all(&browser).unwrap();
    fs::write(browser.join("browser-blob"), vec![0u8; 2048]).unwrap();
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl Client {
    async fn connect(socket: &Path) -> Self {
        let stream = UnixStream::connect(socket).await.expect("connect");
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, request: &Request) {
        let mut line = serde_json::to_vec(request).unwrap();
        line.push(b'\n');
        self.writer.write_all(&line).await.unwrap();
    }

    async fn recv(&mut self) -> Option<Response> {
        let mut line = String::new();
        let read = timeout(Duration::from_secs(10), self.reader.read_line(&mut line))
            .await
            .expect("read timed out")
            .expect("read failed");
        if read == 0 {
            return None;
        }
        Some(serde_json::from_str(&line).expect("malformed response"))
    }

    /// Read until the terminal (non-progress) response for `id`,
    /// collecting the progress records seen for it along the way.
    async fn finish(&mut self, id: &str) -> (Vec<Response>, Response) {
        let mut progress = Vec::new();
        loop {
            let response = self.recv().await.expect("stream closed mid-request");
            if response.id != id {
                continue;
            }
            if response.kind == ResponseKind::Progress {
                progress.push(response);
            } else {
                return (progress, response);
            }
        }
    }
}

#[tokio::test]
async fn scenario_a_scan_then_cleanup() {
    let fixture = start_fixture(Duration::ZERO, Duration::from_secs(60)).await;
    seed_standard_home(fixture.home.path());
    let mut client = Client::connect(&fixture.socket).await;

    client.send(&Request::new("s1", "scan")).await;
    let (progress, result) = client.finish("s1").await;
    assert!(progress.len() >= 4, "start+done per scanner expected");
    assert_eq!(result.kind, ResponseKind::Result);

    let payload = result.result.unwrap();
    assert_eq!(payload["total_size"], 3072);
    let token = payload["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());
    let total_entries: u64 = payload["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["entries"].as_array().unwrap().len() as u64)
        .sum();
    assert_eq!(total_entries, 2);

    client
        .send(&Request::new("c1", "cleanup").with_params(serde_json::json!({ "token": token })))
        .await;
    let (cleanup_progress, cleanup_result) = client.finish("c1").await;
    assert!(!cleanup_progress.is_empty());
    assert_eq!(cleanup_result.kind, ResponseKind::Result);

    let payload = cleanup_result.result.unwrap();
    let removed = payload["removed"].as_u64().unwrap();
    let failed = payload["failed"].as_u64().unwrap();
    assert_eq!(removed + failed, total_entries);
    assert!(payload["bytes_freed"].as_u64().unwrap() <= 3072);
    assert!(!fixture.home.path().join("caches/cache-blob").exists());

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn scenario_b_token_replay_is_rejected() {
    let fixture = start_fixture(Duration::ZERO, Duration::from_secs(60)).await;
    seed_standard_home(fixture.home.path());
    let mut client = Client::connect(&fixture.socket).await;

    client.send(&Request::new("s1", "scan")).await;
    let (_, result) = client.finish("s1").await;
    let token = result.result.unwrap()["token"].as_str().unwrap().to_string();

    client
        .send(&Request::new("c1", "cleanup").with_params(serde_json::json!({ "token": token })))
        .await;
    let (_, first) = client.finish("c1").await;
    assert_eq!(first.kind, ResponseKind::Result);

    client
        .send(&Request::new("c2", "cleanup").with_params(serde_json::json!({ "token": token })))
        .await;
    let (_, replay) = client.finish("c2").await;
    assert_eq!(replay.kind, ResponseKind::Error);
    assert!(replay.error.unwrap().contains("invalid token"));

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn scenario_d_skip_filter() {
    let fixture = start_fixture(Duration::ZERO, Duration::from_secs(60)).await;
    seed_standard_home(fixture.home.path());
    let mut client = Client::connect(&fixture.socket).await;

    client
        .send(
            &Request::new("s1", "scan")
                .with_params(serde_json::json!({ "skip": ["mock-caches"] })),
        )
        .await;
    let (_, result) = client.finish("s1").await;
    let payload = result.result.unwrap();

    let categories = payload["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0]["category"], "mock-browser-data");
    assert_eq!(payload["total_size"], 2048);
    assert!(!payload["token"].as_str().unwrap().is_empty());

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn scenario_e_cleanup_survives_client_disconnect() {
    let fixture = start_fixture(Duration::ZERO, Duration::from_secs(60)).await;
    // three entries so something is still pending when the client leaves
    let caches = fixture.home.path().join("caches");
    fs::create_dir_all(&caches).unwrap();
    for name in ["one", "two", "three"] {
        fs::write(caches.join(name), vec![0u8; 64]).unwrap();
    }

    let mut client = Client::connect(&fixture.socket).await;
    client.send(&Request::new("s1", "scan")).await;
    let (_, result) = client.finish("s1").await;
    let token = result.result.unwrap()["token"].as_str().unwrap().to_string();

    client
        .send(&Request::new("c1", "cleanup").with_params(serde_json::json!({ "token": token })))
        .await;
    // wait for the first entry_progress, then vanish
    loop {
        let response = client.recv().await.expect("stream closed early");
        if response.kind == ResponseKind::Progress
            && response.result.as_ref().and_then(|r| r.get("event"))
                == Some(&serde_json::json!("entry_progress"))
        {
            break;
        }
    }
    drop(client);

    // the remaining entries are still deleted
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let all_gone = ["one", "two", "three"]
            .iter()
            .all(|name| !caches.join(name).exists());
        if all_gone {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "cleanup did not finish after disconnect"
        );
        sleep(Duration::from_millis(25)).await;
    }

    // and the server accepts a fresh connection
    let mut second = Client::connect(&fixture.socket).await;
    second.send(&Request::new("p1", "ping")).await;
    let (_, pong) = second.finish("p1").await;
    assert_eq!(pong.kind, ResponseKind::Result);
    assert_eq!(pong.result.unwrap()["status"], "ok");

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn scenario_f_stale_socket_is_recovered() {
    let home = tempfile::tempdir().unwrap();
    let socket_dir = tempfile::tempdir().unwrap();
    let socket = socket_dir.path().join("macsweep.sock");

    // leave a stale socket file behind, as after a crash
    drop(std::os::unix::net::UnixListener::bind(&socket).unwrap());
    assert!(socket.exists());

    let engine = Engine::new(
        Registry::new(),
        Safety::with_roots(home.path().to_path_buf(), home.path().join("tmp")),
    );
    let server = Server::new(engine, ServerConfig::new(socket.clone()));
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        server.run().await.expect("stale socket must be recovered");
    });

    for _ in 0..100 {
        if UnixStream::connect(&socket).await.is_ok() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    let mut client = Client::connect(&socket).await;
    client.send(&Request::new("p1", "ping")).await;
    let (_, pong) = client.finish("p1").await;
    assert_eq!(pong.kind, ResponseKind::Result);

    shutdown.cancel();
}

#[tokio::test]
async fn busy_flag_rejects_second_operation_but_not_ping() {
    // slow first scanner holds the busy flag long enough to observe it
    let fixture = start_fixture(Duration::from_millis(400), Duration::from_secs(60)).await;
    seed_standard_home(fixture.home.path());
    let mut client = Client::connect(&fixture.socket).await;

    client.send(&Request::new("s1", "scan")).await;
    client.send(&Request::new("s2", "scan")).await;
    client.send(&Request::new("p1", "ping")).await;
    client.send(&Request::new("l1", "categories")).await;

    let (_, rejected) = client.finish("s2").await;
    assert_eq!(rejected.kind, ResponseKind::Error);
    assert!(rejected
        .error
        .unwrap()
        .contains("another operation is in progress"));

    let (_, pong) = client.finish("p1").await;
    assert_eq!(pong.kind, ResponseKind::Result);
    let (_, categories) = client.finish("l1").await;
    assert_eq!(categories.kind, ResponseKind::Result);
    let scanners = categories.result.unwrap()["scanners"]
        .as_array()
        .unwrap()
        .len();
    assert_eq!(scanners, 2);

    // the first scan still completes
    let (_, first) = client.finish("s1").await;
    assert_eq!(first.kind, ResponseKind::Result);

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn unknown_method_errors_but_connection_survives() {
    let fixture = start_fixture(Duration::ZERO, Duration::from_secs(60)).await;
    let mut client = Client::connect(&fixture.socket).await;

    client.send(&Request::new("x1", "frobnicate")).await;
    let (_, err) = client.finish("x1").await;
    assert_eq!(err.kind, ResponseKind::Error);
    assert!(err.error.unwrap().contains("unknown method"));

    client.send(&Request::new("p1", "ping")).await;
    let (_, pong) = client.finish("p1").await;
    assert_eq!(pong.kind, ResponseKind::Result);

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn malformed_record_gets_error_response() {
    let fixture = start_fixture(Duration::ZERO, Duration::from_secs(60)).await;
    let mut client = Client::connect(&fixture.socket).await;

    client.writer.write_all(b"not json at all\n").await.unwrap();
    let response = client.recv().await.unwrap();
    assert_eq!(response.kind, ResponseKind::Error);

    // subsequent requests still work
    client.send(&Request::new("p1", "ping")).await;
    let (_, pong) = client.finish("p1").await;
    assert_eq!(pong.kind, ResponseKind::Result);

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn cleanup_without_token_parameter_is_an_error() {
    let fixture = start_fixture(Duration::ZERO, Duration::from_secs(60)).await;
    let mut client = Client::connect(&fixture.socket).await;

    client.send(&Request::new("c1", "cleanup")).await;
    let (_, err) = client.finish("c1").await;
    assert_eq!(err.kind, ResponseKind::Error);
    assert!(err.error.unwrap().contains("token"));

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn idle_timeout_closes_the_connection() {
    let fixture = start_fixture(Duration::ZERO, Duration::from_millis(200)).await;
    let mut client = Client::connect(&fixture.socket).await;

    sleep(Duration::from_millis(600)).await;
    // the server hung up; reads observe end-of-stream
    assert!(client.recv().await.is_none());

    fixture.shutdown.cancel();
}

#[tokio::test]
async fn shutdown_method_acknowledges_and_stops_the_server() {
    let fixture = start_fixture(Duration::ZERO, Duration::from_secs(60)).await;
    let mut client = Client::connect(&fixture.socket).await;

    client.send(&Request::new("q1", "shutdown")).await;
    let (_, ack) = client.finish("q1").await;
    assert_eq!(ack.kind, ResponseKind::Result);
    assert_eq!(ack.result.unwrap()["status"], "shutting_down");

    // the socket file disappears once the server exits
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while fixture.socket.exists() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "socket file was not removed"
        );
        sleep(Duration::from_millis(25)).await;
    }
}
