//! wh-core: Core abstractions and configuration for workerhost
//!
//! This crate provides the host options, the error taxonomy, and the traits
//! through which the supervisor reaches its collaborators (process spawning
//! and script loading).

pub mod config;
pub mod error;
pub mod traits;

pub use config::{ConfigFile, HostOptions, WorkerLaunchOptions};
pub use error::{ConfigError, HostError, Result};
pub use traits::{OutputStream, ProcessFactory, ResourceReader, WorkerProcess};
