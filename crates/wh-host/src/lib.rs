//! wh-host: Host-side supervisor and RPC client for a long-lived worker
//!
//! The [`Supervisor`] starts the worker on demand, waits for its readiness
//! handshake, respawns it after it dies, and posts invocations to it through
//! the [`HttpTransport`]. Results are decoded according to the requested
//! [`InvocationOutput`] type.

pub mod process;
pub mod resource;
pub mod supervisor;
pub mod transport;

pub use process::{ChildProcess, CommandProcessFactory};
pub use resource::{FileResourceReader, StaticResourceReader};
pub use supervisor::{Supervisor, WORKER_LOG_TARGET};
pub use transport::{
    ContentBuilder, HttpTransport, InvocationContent, InvocationOutput, Json, ResponseStream,
};

pub use wh_core::{HostError, HostOptions, Result, WorkerLaunchOptions};
pub use wh_protocol::{Endpoint, InvocationRequest, ModuleStream};
