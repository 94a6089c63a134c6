//! wh-protocol: Wire conventions shared by the workerhost host and its worker
//!
//! This crate defines the readiness handshake the worker prints on stdout,
//! the framing of the worker's log output, and the invocation request model
//! that is posted to the worker's endpoint.

pub mod error;
pub mod handshake;
pub mod invocation;
pub mod log;

pub use error::ProtocolError;
pub use handshake::{format_handshake, is_handshake, parse_handshake, Endpoint, HANDSHAKE_PREFIX};
pub use invocation::{
    InvocationErrorPayload, InvocationRequest, ModuleSource, ModuleSourceType, ModuleStream,
    MODULE_BOUNDARY,
};
pub use log::{LogAccumulator, MESSAGE_TERMINATOR};
