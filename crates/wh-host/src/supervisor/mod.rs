//! Worker process supervision
//!
//! The supervisor owns the single worker process and makes sure that every
//! invocation reaches a worker that has announced its endpoint.
//!
//! # Start-up gate
//!
//! Any number of callers may notice at the same time that no live worker
//! exists. They serialise on a single-slot gate and re-check under it, so
//! exactly one of them spawns. Every caller, the spawner included, then waits
//! on the readiness channel of that generation, which the stdout task
//! resolves once when the handshake arrives. Waiting on the gate or on
//! readiness is cancellation-safe: dropping a caller's future only affects
//! that caller.
//!
//! Death is detected lazily, at the start of the next call.

mod generation;
mod output;

pub use output::WORKER_LOG_TARGET;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use wh_core::{HostError, HostOptions, ProcessFactory, ResourceReader, Result};
use wh_protocol::{Endpoint, InvocationRequest, ModuleStream};

use crate::process::CommandProcessFactory;
use crate::resource::FileResourceReader;
use crate::transport::{HttpTransport, InvocationOutput};

use generation::WorkerGeneration;

/// Supervises the worker process and dispatches invocations to it
pub struct Supervisor {
    options: HostOptions,
    factory: Arc<dyn ProcessFactory>,
    resources: Arc<dyn ResourceReader>,
    transport: HttpTransport,
    /// Current generation; replaced only while holding `spawn_gate`
    current: RwLock<Option<Arc<WorkerGeneration>>>,
    spawn_gate: tokio::sync::Mutex<()>,
    generations: AtomicU64,
    disposed: AtomicBool,
}

impl Supervisor {
    /// Create a supervisor with explicit collaborators
    pub fn new(
        options: HostOptions,
        factory: Arc<dyn ProcessFactory>,
        resources: Arc<dyn ResourceReader>,
    ) -> Self {
        Self {
            options,
            factory,
            resources,
            transport: HttpTransport::new(),
            current: RwLock::new(None),
            spawn_gate: tokio::sync::Mutex::new(()),
            generations: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    /// Create a supervisor that spawns `options.worker` with a script read from `script_dir`
    pub fn with_script_dir(options: HostOptions, script_dir: impl Into<PathBuf>) -> Self {
        let factory = Arc::new(CommandProcessFactory::new(options.worker.clone()));
        let resources = Arc::new(FileResourceReader::new(script_dir));
        Self::new(options, factory, resources)
    }

    /// Replace the RPC transport
    pub fn with_transport(mut self, transport: HttpTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Host options
    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    /// Endpoint of the current worker, if it is ready
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.current_generation().and_then(|g| g.endpoint())
    }

    /// Whether [`Supervisor::dispose`] has been called
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Invoke a module file
    pub async fn invoke_from_file<T: InvocationOutput>(
        &self,
        path: impl Into<String>,
        export_name: Option<&str>,
        args: Vec<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T::Output> {
        let request = InvocationRequest::from_file(path)
            .with_export(export_name.map(String::from))
            .with_args(args);
        self.invoke::<T>(request, cancel).await?.ok_or(HostError::UnexpectedStatus(404))
    }

    /// Invoke inline module text, optionally caching it under `new_cache_id`
    pub async fn invoke_from_string<T: InvocationOutput>(
        &self,
        module_text: impl Into<String>,
        new_cache_id: Option<&str>,
        export_name: Option<&str>,
        args: Vec<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T::Output> {
        let request = InvocationRequest::from_string(module_text, new_cache_id.map(String::from))
            .with_export(export_name.map(String::from))
            .with_args(args);
        self.invoke::<T>(request, cancel).await?.ok_or(HostError::UnexpectedStatus(404))
    }

    /// Invoke module text read from a stream, optionally caching it under `new_cache_id`
    ///
    /// The stream is consumed once, so these invocations are never retried.
    pub async fn invoke_from_stream<T: InvocationOutput>(
        &self,
        stream: ModuleStream,
        new_cache_id: Option<&str>,
        export_name: Option<&str>,
        args: Vec<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T::Output> {
        let request = InvocationRequest::from_stream(stream, new_cache_id.map(String::from))
            .with_export(export_name.map(String::from))
            .with_args(args);
        self.invoke::<T>(request, cancel).await?.ok_or(HostError::UnexpectedStatus(404))
    }

    /// Invoke a module the worker has cached
    ///
    /// Returns `Ok(None)` when nothing is cached under `cache_id`.
    pub async fn try_invoke_from_cache<T: InvocationOutput>(
        &self,
        cache_id: impl Into<String>,
        export_name: Option<&str>,
        args: Vec<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<T::Output>> {
        let request = InvocationRequest::from_cache(cache_id)
            .with_export(export_name.map(String::from))
            .with_args(args);
        self.invoke::<T>(request, cancel).await
    }

    /// Run a request, retrying timeouts and transport failures up to `num_retries` times
    pub async fn invoke<T: InvocationOutput>(
        &self,
        mut request: InvocationRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<T::Output>> {
        let mut attempt = 0;

        loop {
            if self.is_disposed() {
                return Err(HostError::Disposed);
            }

            let retry = if attempt < self.options.num_retries {
                request.try_clone()
            } else {
                None
            };

            match (self.invoke_once::<T>(request, cancel).await, retry) {
                (Err(e), Some(next)) if e.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max = self.options.num_retries,
                        "Invocation failed, retrying: {}",
                        e
                    );
                    request = next;
                }
                (result, _) => return result,
            }
        }
    }

    /// One attempt, bounded by the configured timeout and the caller's token
    async fn invoke_once<T: InvocationOutput>(
        &self,
        request: InvocationRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<T::Output>> {
        let source_type = request.source_type();
        let work = async {
            let endpoint = self.ensure_ready().await?;
            tracing::debug!(%endpoint, ?source_type, "Dispatching invocation");
            self.transport.try_invoke::<T>(request, &endpoint).await
        };

        let deadline = async {
            match self.options.timeout() {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = work => result,
            _ = deadline => Err(self.timeout_error()),
            _ = cancelled => Err(HostError::Cancelled),
        }
    }

    /// Error reported when the per-call deadline fires
    fn timeout_error(&self) -> HostError {
        match self.current_generation() {
            None => HostError::ConnectionTimeout("no worker process was started".to_string()),
            Some(generation) if generation.endpoint().is_none() => {
                HostError::ConnectionTimeout(format!(
                    "worker did not announce its endpoint within {}ms",
                    self.options.timeout_ms
                ))
            }
            Some(_) => HostError::Timeout {
                timeout_ms: self.options.timeout_ms,
            },
        }
    }

    /// Return the endpoint of a live, ready worker, spawning one if needed
    async fn ensure_ready(&self) -> Result<Endpoint> {
        let generation = match self.live_generation() {
            Some(generation) => generation,
            None => self.respawn().await?,
        };
        generation.wait_ready().await
    }

    async fn respawn(&self) -> Result<Arc<WorkerGeneration>> {
        let _gate = self.spawn_gate.lock().await;

        if self.is_disposed() {
            return Err(HostError::Disposed);
        }

        // Another caller may have spawned while this one waited on the gate
        if let Some(generation) = self.live_generation() {
            return Ok(generation);
        }

        let previous = self.write_current().take();
        if let Some(previous) = previous {
            tracing::info!(
                generation = previous.id(),
                pid = ?previous.pid(),
                "Worker is gone, replacing it"
            );
            previous.retire(self.options.shutdown_grace()).await;
        }

        let identifier = &self.options.worker.script_identifier;
        let script = self
            .resources
            .read_as_string(identifier)
            .map_err(|source| HostError::Resource {
                identifier: identifier.clone(),
                source,
            })?;
        let process = self.factory.create(&script).map_err(HostError::Spawn)?;

        let id = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::new(WorkerGeneration::start(id, process));
        tracing::info!(generation = id, pid = ?generation.pid(), "Spawned worker process");

        *self.write_current() = Some(Arc::clone(&generation));
        Ok(generation)
    }

    /// Stop the worker and reject further invocations
    ///
    /// Calling this more than once has no further effect.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _gate = self.spawn_gate.lock().await;
        let current = self.write_current().take();
        if let Some(generation) = current {
            generation.retire(self.options.shutdown_grace()).await;
        }
        tracing::info!("Worker host disposed");
    }

    fn current_generation(&self) -> Option<Arc<WorkerGeneration>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn live_generation(&self) -> Option<Arc<WorkerGeneration>> {
        self.current_generation().filter(|g| !g.is_dead())
    }

    fn write_current(&self) -> std::sync::RwLockWriteGuard<'_, Option<Arc<WorkerGeneration>>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}
