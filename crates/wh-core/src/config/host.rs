//! Host configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Options for the worker host, read once at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostOptions {
    /// Per-invocation timeout in milliseconds (zero or negative disables it)
    pub timeout_ms: i64,

    /// Extra attempts after a timeout or transport failure
    pub num_retries: u32,

    /// How long dispose waits for a killed worker to exit, in milliseconds
    pub shutdown_grace_ms: u64,

    /// Worker launch parameters
    pub worker: WorkerLaunchOptions,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            num_retries: 0,
            shutdown_grace_ms: 1_000,
            worker: WorkerLaunchOptions::default(),
        }
    }
}

impl HostOptions {
    /// Invocation timeout, or `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        u64::try_from(self.timeout_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Bounded wait for process exit on dispose
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// How the worker process is launched
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerLaunchOptions {
    /// Interpreter or binary to run
    pub executable: String,

    /// Arguments placed before the script
    pub args: Vec<String>,

    /// Flag introducing inline script text (e.g. `-e`); when unset the
    /// script text is passed as a bare argument
    pub script_flag: Option<String>,

    /// Identifier handed to the resource reader to load the worker script
    pub script_identifier: String,

    /// Port the worker should bind (0 lets it pick a free port)
    pub port: u16,

    /// Working directory of the worker
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables
    pub env: HashMap<String, String>,
}

impl Default for WorkerLaunchOptions {
    fn default() -> Self {
        Self {
            executable: "node".to_string(),
            args: Vec::new(),
            script_flag: Some("-e".to_string()),
            script_identifier: "worker.js".to_string(),
            port: 0,
            working_dir: None,
            env: HashMap::new(),
        }
    }
}

impl WorkerLaunchOptions {
    /// Full argument list for a worker running `script`
    pub fn command_args(&self, script: &str, parent_pid: u32) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(flag) = &self.script_flag {
            args.push(flag.clone());
        }
        args.push(script.to_string());
        args.extend([
            "--parentPid".to_string(),
            parent_pid.to_string(),
            "--port".to_string(),
            self.port.to_string(),
        ]);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_disabled_when_not_positive() {
        let mut options = HostOptions::default();
        assert_eq!(options.timeout(), Some(Duration::from_secs(60)));

        options.timeout_ms = 0;
        assert_eq!(options.timeout(), None);

        options.timeout_ms = -5;
        assert_eq!(options.timeout(), None);
    }

    #[test]
    fn test_command_args() {
        let options = WorkerLaunchOptions {
            args: vec!["--inspect".to_string()],
            port: 9000,
            ..Default::default()
        };

        assert_eq!(
            options.command_args("console.log(1)", 42),
            vec!["--inspect", "-e", "console.log(1)", "--parentPid", "42", "--port", "9000"]
        );
    }

    #[test]
    fn test_command_args_without_script_flag() {
        let options = WorkerLaunchOptions {
            executable: "custom-runner".to_string(),
            script_flag: None,
            ..Default::default()
        };

        let args = options.command_args("run()", 7);
        assert_eq!(args[0], "run()");
        assert_eq!(args.len(), 5);
    }
}
