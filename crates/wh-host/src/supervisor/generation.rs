//! One spawned worker and its readiness state

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;

use wh_core::{HostError, Result, WorkerProcess};
use wh_protocol::Endpoint;

use super::output::{relay_stderr, relay_stdout, ReadyState};

/// A worker process plus the readiness channel its handshake resolves
///
/// The endpoint is written once per generation, by the stdout task, and read
/// by every caller waiting on [`WorkerGeneration::wait_ready`].
pub(crate) struct WorkerGeneration {
    id: u64,
    pid: Option<u32>,
    process: Mutex<Option<Box<dyn WorkerProcess>>>,
    ready: watch::Receiver<ReadyState>,
}

impl WorkerGeneration {
    /// Take ownership of a freshly spawned process and start relaying its output
    pub(crate) fn start(id: u64, mut process: Box<dyn WorkerProcess>) -> Self {
        let (ready_tx, ready_rx) = watch::channel(ReadyState::Starting);

        match process.take_stdout() {
            Some(stdout) => {
                tokio::spawn(relay_stdout(id, stdout, ready_tx));
            }
            None => {
                ready_tx.send_replace(ReadyState::Lost("worker has no stdout".to_string()));
            }
        }
        if let Some(stderr) = process.take_stderr() {
            tokio::spawn(relay_stderr(id, stderr));
        }

        Self {
            id,
            pid: process.id(),
            process: Mutex::new(Some(process)),
            ready: ready_rx,
        }
    }

    /// Generation number
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// OS process ID
    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn lock_process(&self) -> MutexGuard<'_, Option<Box<dyn WorkerProcess>>> {
        self.process.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether this generation can no longer serve invocations
    pub(crate) fn is_dead(&self) -> bool {
        if matches!(*self.ready.borrow(), ReadyState::Lost(_)) {
            return true;
        }
        self.lock_process()
            .as_mut()
            .map_or(true, |process| process.has_exited())
    }

    /// Endpoint, if the handshake has been received
    pub(crate) fn endpoint(&self) -> Option<Endpoint> {
        match *self.ready.borrow() {
            ReadyState::Ready(endpoint) => Some(endpoint),
            _ => None,
        }
    }

    /// Wait until the handshake arrives or can no longer arrive
    pub(crate) async fn wait_ready(&self) -> Result<Endpoint> {
        let mut ready = self.ready.clone();
        let state = ready
            .wait_for(|state| *state != ReadyState::Starting)
            .await
            .map(|state| (*state).clone())
            .map_err(|_| {
                HostError::ConnectionTimeout("worker output closed before the handshake".to_string())
            })?;

        match state {
            ReadyState::Ready(endpoint) => Ok(endpoint),
            ReadyState::Lost(reason) => Err(HostError::ConnectionTimeout(reason)),
            ReadyState::Starting => Err(HostError::ConnectionTimeout(
                "worker never announced its endpoint".to_string(),
            )),
        }
    }

    /// Kill the process, waiting at most `grace` for it to exit
    pub(crate) async fn retire(&self, grace: Duration) {
        let process = self.lock_process().take();
        let Some(mut process) = process else {
            return;
        };

        match tokio::time::timeout(grace, process.kill()).await {
            Ok(Ok(())) => {
                tracing::debug!(generation = self.id, pid = ?self.pid, "Worker process stopped");
            }
            Ok(Err(e)) => {
                tracing::warn!(generation = self.id, pid = ?self.pid, "Failed to kill worker: {}", e);
            }
            Err(_) => {
                tracing::warn!(
                    generation = self.id,
                    pid = ?self.pid,
                    "Worker did not exit within {:?}",
                    grace
                );
                process.start_kill();
            }
        }
    }
}

impl Drop for WorkerGeneration {
    fn drop(&mut self) {
        if let Some(mut process) = self.lock_process().take() {
            process.start_kill();
        }
    }
}
