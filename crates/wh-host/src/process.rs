//! Worker processes backed by `tokio::process`

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use wh_core::{OutputStream, ProcessFactory, WorkerLaunchOptions, WorkerProcess};

/// Spawns the worker as a child process according to [`WorkerLaunchOptions`]
#[derive(Debug, Clone)]
pub struct CommandProcessFactory {
    options: WorkerLaunchOptions,
}

impl CommandProcessFactory {
    pub fn new(options: WorkerLaunchOptions) -> Self {
        Self { options }
    }

    /// Launch options
    pub fn options(&self) -> &WorkerLaunchOptions {
        &self.options
    }

    fn command(&self, script: &str) -> Command {
        let mut command = Command::new(&self.options.executable);
        command
            .args(self.options.command_args(script, std::process::id()))
            .envs(&self.options.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.options.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl ProcessFactory for CommandProcessFactory {
    fn create(&self, script: &str) -> std::io::Result<Box<dyn WorkerProcess>> {
        let child = self.command(script).spawn()?;
        tracing::debug!(
            executable = %self.options.executable,
            pid = ?child.id(),
            "Started worker child process"
        );
        Ok(Box::new(ChildProcess::new(child)))
    }
}

/// A spawned child process
///
/// The child is killed when this value is dropped.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

#[async_trait]
impl WorkerProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.child
            .stdout
            .take()
            .map(|stdout| Box::new(stdout) as OutputStream)
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.child
            .stderr
            .take()
            .map(|stderr| Box::new(stderr) as OutputStream)
    }

    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    fn start_kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(pid = ?self.child.id(), "start_kill failed: {}", e);
        }
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}
