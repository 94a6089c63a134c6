//! Worker process traits

use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Readable stdout or stderr of a worker
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Handle to a spawned worker process
///
/// Owned exclusively by the supervisor. Implementations must terminate the
/// process when dropped.
#[async_trait]
pub trait WorkerProcess: Send {
    /// OS process ID, if known
    fn id(&self) -> Option<u32>;

    /// Take the stdout stream (only the first call returns it)
    fn take_stdout(&mut self) -> Option<OutputStream>;

    /// Take the stderr stream (only the first call returns it)
    fn take_stderr(&mut self) -> Option<OutputStream>;

    /// Check, without blocking, whether the process has exited
    fn has_exited(&mut self) -> bool;

    /// Signal the process to terminate without waiting for it
    fn start_kill(&mut self);

    /// Terminate the process and wait for it to exit
    async fn kill(&mut self) -> std::io::Result<()>;
}

/// Spawns worker processes
pub trait ProcessFactory: Send + Sync {
    /// Start a worker running `script`
    fn create(&self, script: &str) -> std::io::Result<Box<dyn WorkerProcess>>;
}
