//! Shared harness: an in-process HTTP worker and a fake process factory

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::io::DuplexStream;

use wh_core::{OutputStream, ProcessFactory, WorkerProcess};
use wh_host::{HostOptions, StaticResourceReader, Supervisor};
use wh_protocol::{format_handshake, MODULE_BOUNDARY};

/// Module names with special behaviour in the fake worker
pub const THROW: &str = "throw";
pub const HANG: &str = "hang";
pub const TEAPOT: &str = "teapot";
pub const MISSING: &str = "missing";
pub const CACHED: &str = "cached";

/// A running fake worker
pub struct FakeWorker {
    pub addr: SocketAddr,
    requests: Arc<AtomicUsize>,
}

impl FakeWorker {
    pub async fn start() -> Self {
        let requests = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/", post(handle))
            .with_state(Arc::clone(&requests));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake worker");
        let addr = listener.local_addr().expect("Fake worker has no address");

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, requests }
    }

    /// Number of requests received so far
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn split_body(body: &[u8]) -> (&[u8], Option<&[u8]>) {
    match body
        .windows(MODULE_BOUNDARY.len())
        .position(|window| window == MODULE_BOUNDARY)
    {
        Some(at) => (&body[..at], Some(&body[at + MODULE_BOUNDARY.len()..])),
        None => (body, None),
    }
}

async fn handle(State(requests): State<Arc<AtomicUsize>>, body: Bytes) -> Response {
    requests.fetch_add(1, Ordering::SeqCst);

    let (head, module) = split_body(&body);
    let Ok(head) = serde_json::from_slice::<Value>(head) else {
        return (StatusCode::BAD_REQUEST, "invalid request json").into_response();
    };

    let source_type = head["moduleSourceType"].as_u64().unwrap_or(u64::MAX);
    let source = head["moduleSource"].as_str().unwrap_or_default().to_string();

    if source_type == 3 && source != CACHED {
        return StatusCode::NOT_FOUND.into_response();
    }

    if module == Some(HANG.as_bytes()) {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }

    match source.as_str() {
        THROW => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "errorMessage": "kaboom",
                "errorStack": "Error: kaboom\n    at worker.js:1:1",
            })),
        )
            .into_response(),
        HANG => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            StatusCode::OK.into_response()
        }
        TEAPOT => StatusCode::IM_A_TEAPOT.into_response(),
        MISSING => StatusCode::NOT_FOUND.into_response(),
        _ => {
            let module = module.map(|m| String::from_utf8_lossy(m).into_owned());
            Json(json!({
                "sourceType": source_type,
                "source": source,
                "module": module,
                "exportName": head["exportName"],
                "newCacheIdentifier": head["newCacheIdentifier"],
                "args": head["args"],
            }))
            .into_response()
        }
    }
}

/// How fake processes behave after spawning
#[derive(Debug, Clone, Copy)]
pub enum Startup {
    /// Print the handshake for the given address
    Announce(SocketAddr),
    /// Keep stdout open without ever printing a handshake
    Silent,
    /// Close stdout immediately
    Crash,
}

/// Process factory that records spawns instead of starting real processes
pub struct FakeFactory {
    startup: Startup,
    scripts: Mutex<Vec<String>>,
    exited: Mutex<Vec<Arc<AtomicBool>>>,
}

impl FakeFactory {
    pub fn new(startup: Startup) -> Arc<Self> {
        Arc::new(Self {
            startup,
            scripts: Mutex::new(Vec::new()),
            exited: Mutex::new(Vec::new()),
        })
    }

    /// Number of processes created
    pub fn spawns(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }

    /// Scripts handed to `create`, in order
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    /// Simulate the most recent process exiting on its own
    pub fn exit_latest(&self) {
        if let Some(flag) = self.exited.lock().unwrap().last() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Whether the process created `index`-th has been stopped
    pub fn has_exited(&self, index: usize) -> bool {
        self.exited.lock().unwrap()[index].load(Ordering::SeqCst)
    }
}

impl ProcessFactory for FakeFactory {
    fn create(&self, script: &str) -> std::io::Result<Box<dyn WorkerProcess>> {
        let exited = Arc::new(AtomicBool::new(false));
        self.scripts.lock().unwrap().push(script.to_string());
        self.exited.lock().unwrap().push(Arc::clone(&exited));

        let pid = self.spawns() as u32 + 1000;
        let process = match self.startup {
            Startup::Announce(addr) => {
                let line = format!("starting\0\n{}\n", format_handshake(addr));
                FakeProcess::new(pid, Box::new(std::io::Cursor::new(line.into_bytes())), None, exited)
            }
            Startup::Silent => {
                let (reader, writer) = tokio::io::duplex(64);
                FakeProcess::new(pid, Box::new(reader), Some(writer), exited)
            }
            Startup::Crash => FakeProcess::new(pid, Box::new(tokio::io::empty()), None, exited),
        };
        Ok(Box::new(process))
    }
}

struct FakeProcess {
    pid: u32,
    stdout: Option<OutputStream>,
    /// Held so a silent process keeps its stdout open until killed
    stdout_writer: Option<DuplexStream>,
    exited: Arc<AtomicBool>,
}

impl FakeProcess {
    fn new(
        pid: u32,
        stdout: OutputStream,
        stdout_writer: Option<DuplexStream>,
        exited: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pid,
            stdout: Some(stdout),
            stdout_writer,
            exited,
        }
    }
}

#[async_trait]
impl WorkerProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        Some(Box::new(std::io::Cursor::new(b"warming up\0\n".to_vec())))
    }

    fn has_exited(&mut self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    fn start_kill(&mut self) {
        self.stdout_writer.take();
        self.exited.store(true, Ordering::SeqCst);
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.start_kill();
        Ok(())
    }
}

/// Supervisor wired to `factory` with an embedded worker script
pub fn supervisor(options: HostOptions, factory: Arc<FakeFactory>) -> Supervisor {
    let resources = StaticResourceReader::new().with("worker.js", "// fake worker");
    Supervisor::new(options, factory, Arc::new(resources))
}

/// Options with a short timeout suitable for tests
pub fn options(timeout_ms: i64) -> HostOptions {
    HostOptions {
        timeout_ms,
        shutdown_grace_ms: 100,
        ..Default::default()
    }
}
