// Copyright 2026 The macsweep developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! IPC server: one Unix stream socket, one connection at a time.
//!
//! Requests are line-delimited JSON records (see `protocol`). Long
//! operations stream `progress` records and are guarded by an atomic busy
//! flag so only one scan or cleanup runs per process; `ping` and
//! `categories` are always admissible. Each read arms an idle deadline,
//! and a client disconnect cancels the connection context; a running
//! cleanup then finishes silently.

use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::Error;
use crate::protocol::{read_request, RecordWriter, Request, Response};

/// Runtime-settable server knobs. Everything else is compile-time.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Connection is closed after this long without a client read.
    pub idle_timeout: Duration,
}

impl ServerConfig {
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

enum ConnExit {
    Closed,
    Shutdown,
}

type ConnWriter = Arc<RecordWriter<OwnedWriteHalf>>;

pub struct Server {
    engine: Engine,
    config: ServerConfig,
    busy: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl Server {
    pub fn new(engine: Engine, config: ServerConfig) -> Self {
        Self {
            engine,
            config,
            busy: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the accept loop; wire it to signal handlers.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bind the socket and serve until `shutdown` fires. The socket file
    /// is removed on the way out, best effort.
    pub async fn run(&self) -> Result<(), Error> {
        let listener = bind_socket(&self.config.socket_path)?;
        info!(socket = %self.config.socket_path.display(), "listening");

        loop {
            let (stream, _addr) = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(%err, "accept failed");
                        continue;
                    }
                },
            };
            // shutdown (e.g. a signal) also interrupts the active
            // connection; an in-flight cleanup still runs to completion
            let exit = tokio::select! {
                _ = self.shutdown.cancelled() => Ok(ConnExit::Shutdown),
                served = self.serve_connection(stream) => served,
            };
            match exit {
                Ok(ConnExit::Shutdown) => break,
                Ok(ConnExit::Closed) => {}
                Err(err) => debug!(%err, "connection ended with error"),
            }
        }

        drop(listener);
        if let Err(err) = fs::remove_file(&self.config.socket_path) {
            debug!(%err, "could not remove socket file");
        }
        info!("server stopped");
        Ok(())
    }

    /// Serve one connection to completion. Requests are dispatched from a
    /// single read loop; long operations run as tasks writing through the
    /// shared record writer, so the loop keeps noticing disconnects and
    /// answering `ping` while a scan or cleanup streams.
    async fn serve_connection(&self, stream: UnixStream) -> Result<ConnExit, Error> {
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let writer: ConnWriter = Arc::new(RecordWriter::new(write_half));
        let conn_cancel = CancellationToken::new();

        let exit = loop {
            let request = match timeout(self.config.idle_timeout, read_request(&mut reader)).await
            {
                Err(_elapsed) => {
                    info!("closing connection after idle timeout");
                    break ConnExit::Closed;
                }
                Ok(Err(Error::Protocol(message))) => {
                    // the record never identified itself; answer on an
                    // empty id and keep serving
                    let _ = writer.write(&Response::error("", message)).await;
                    continue;
                }
                Ok(Err(err)) => {
                    debug!(%err, "read failed");
                    break ConnExit::Closed;
                }
                Ok(Ok(None)) => break ConnExit::Closed,
                Ok(Ok(Some(request))) => request,
            };

            match request.method.as_str() {
                "ping" => {
                    let payload = serde_json::json!({
                        "status": "ok",
                        "version": env!("CARGO_PKG_VERSION"),
                    });
                    if writer.write(&Response::result(request.id, payload)).await.is_err() {
                        break ConnExit::Closed;
                    }
                }
                "categories" => {
                    let scanners: Vec<_> = self
                        .engine
                        .registry()
                        .categories()
                        .into_iter()
                        .map(|info| serde_json::json!({"id": info.id, "label": info.name}))
                        .collect();
                    let payload = serde_json::json!({ "scanners": scanners });
                    if writer.write(&Response::result(request.id, payload)).await.is_err() {
                        break ConnExit::Closed;
                    }
                }
                "scan" => {
                    self.dispatch_scan(request, writer.clone(), conn_cancel.child_token())
                        .await;
                }
                "cleanup" => {
                    self.dispatch_cleanup(request, writer.clone(), conn_cancel.child_token())
                        .await;
                }
                "shutdown" => {
                    let payload = serde_json::json!({"status": "shutting_down"});
                    let _ = writer.write(&Response::result(request.id, payload)).await;
                    info!("shutdown requested over IPC");
                    self.shutdown.cancel();
                    break ConnExit::Shutdown;
                }
                other => {
                    let message = format!("unknown method '{other}'");
                    if writer.write(&Response::error(request.id, message)).await.is_err() {
                        break ConnExit::Closed;
                    }
                }
            }
        };

        // cancel anything still streaming on this connection; an in-flight
        // cleanup keeps deleting, it just stops talking
        conn_cancel.cancel();
        Ok(exit)
    }

    async fn dispatch_scan(&self, request: Request, writer: ConnWriter, cancel: CancellationToken) {
        let skip: HashSet<String> = match &request.params {
            None => HashSet::new(),
            Some(params) => match params.get("skip") {
                None | Some(serde_json::Value::Null) => HashSet::new(),
                Some(value) => match serde_json::from_value(value.clone()) {
                    Ok(skip) => skip,
                    Err(err) => {
                        let _ = writer
                            .write(&Response::error(
                                request.id,
                                format!("invalid 'skip' parameter: {err}"),
                            ))
                            .await;
                        return;
                    }
                },
            },
        };

        let Some(guard) = BusyGuard::try_acquire(&self.busy) else {
            let _ = writer
                .write(&Response::error(
                    request.id,
                    "another operation is in progress",
                ))
                .await;
            return;
        };

        let engine = self.engine.clone();
        let id = request.id;
        tokio::spawn(async move {
            let _held = guard;
            let (mut events, done) = engine.scan_all(cancel.clone(), skip);
            while let Some(event) = events.recv().await {
                if cancel.is_cancelled() {
                    break;
                }
                let payload = match serde_json::to_value(&event) {
                    Ok(payload) => payload,
                    Err(_) => continue,
                };
                if writer.write(&Response::progress(id.as_str(), payload)).await.is_err() {
                    break;
                }
            }
            // close our end so the engine never blocks on a send we will
            // not read
            drop(events);
            let response = match done.await {
                Ok(outcome) => match outcome.error {
                    Some(err) => Response::error(id.as_str(), err.to_string()),
                    None => {
                        let mut payload = serde_json::to_value(&outcome.summary)
                            .unwrap_or_else(|_| serde_json::json!({}));
                        payload["token"] = serde_json::Value::String(outcome.token);
                        Response::result(id.as_str(), payload)
                    }
                },
                Err(_) => Response::error(id.as_str(), Error::Cancelled.to_string()),
            };
            let _ = writer.write(&response).await;
        });
    }

    async fn dispatch_cleanup(
        &self,
        request: Request,
        writer: ConnWriter,
        cancel: CancellationToken,
    ) {
        let token = request
            .params
            .as_ref()
            .and_then(|params| params.get("token"))
            .and_then(|token| token.as_str())
            .map(str::to_string);
        let Some(token) = token else {
            let _ = writer
                .write(&Response::error(request.id, "missing 'token' parameter"))
                .await;
            return;
        };

        let categories: Vec<String> = request
            .params
            .as_ref()
            .and_then(|params| params.get("categories"))
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();

        let Some(guard) = BusyGuard::try_acquire(&self.busy) else {
            let _ = writer
                .write(&Response::error(
                    request.id,
                    "another operation is in progress",
                ))
                .await;
            return;
        };

        let engine = self.engine.clone();
        let id = request.id;
        tokio::spawn(async move {
            let _held = guard;
            let (mut events, done) = engine.cleanup(cancel.clone(), token, categories);
            while let Some(event) = events.recv().await {
                if cancel.is_cancelled() {
                    break;
                }
                let payload = match serde_json::to_value(&event) {
                    Ok(payload) => payload,
                    Err(_) => continue,
                };
                if writer.write(&Response::progress(id.as_str(), payload)).await.is_err() {
                    break;
                }
            }
            drop(events);
            let response = match done.await {
                Ok(outcome) => match outcome.error {
                    Some(err) => Response::error(id.as_str(), err.to_string()),
                    None => {
                        let payload = serde_json::to_value(&outcome.result)
                            .unwrap_or_else(|_| serde_json::json!({}));
                        Response::result(id.as_str(), payload)
                    }
                },
                Err(_) => Response::error(id.as_str(), Error::Cancelled.to_string()),
            };
            let _ = writer.write(&response).await;
        });
    }
}

/// Serialises scan/cleanup admission; released on drop.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Bind the listen socket, recovering from a stale file.
///
/// If something already sits at the path: a connectable socket means a
/// live instance (refuse to start), an unconnectable socket is a leftover
/// from a crash (remove and continue), anything else is obstruction
/// (refuse to start).
fn bind_socket(path: &Path) -> Result<UnixListener, Error> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            match std::os::unix::net::UnixStream::connect(path) {
                Ok(_live) => return Err(Error::AlreadyRunning(path.to_path_buf())),
                Err(_dead) => {
                    info!(socket = %path.display(), "removing stale socket file");
                    fs::remove_file(path)?;
                }
            }
        }
        Ok(_not_socket) => return Err(Error::SocketObstructed(path.to_path_buf())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    UnixListener::bind(path).map_err(|err| Error::Bind {
        path: path.to_path_buf(),
        source: err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener as StdUnixListener;

    #[tokio::test]
    async fn stale_socket_is_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macsweep.sock");
        // bind and immediately drop: the file stays behind like after a
        // crash
        drop(StdUnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let listener = bind_socket(&path).expect("stale socket must be recovered");
        drop(listener);
    }

    #[tokio::test]
    async fn live_socket_refuses_second_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macsweep.sock");
        let _live = StdUnixListener::bind(&path).unwrap();

        let err = bind_socket(&path).unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning(_)));
    }

    #[tokio::test]
    async fn non_socket_file_obstructs_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macsweep.sock");
        fs::write(&path, b"not a socket").unwrap();

        let err = bind_socket(&path).unwrap_err();
        assert!(matches!(err, Error::SocketObstructed(_)));
    }

    #[test]
    fn busy_guard_is_exclusive_and_releases() {
        let flag = Arc::new(AtomicBool::new(false));
        let first = BusyGuard::try_acquire(&flag).unwrap();
        assert!(BusyGuard::try_acquire(&flag).is_none());
        drop(first);
        assert!(BusyGuard::try_acquire(&flag).is_some());
    }
}
