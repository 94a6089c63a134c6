//! Collaborator traits consumed by the supervisor

mod process;
mod resource;

pub use process::{OutputStream, ProcessFactory, WorkerProcess};
pub use resource::ResourceReader;
