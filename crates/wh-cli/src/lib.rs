//! wh-cli: Command-line interface for workerhost
//!
//! Provides the `workerhost` binary, which loads host options from a config
//! file, starts the worker on demand and prints invocation results.

pub mod commands;
pub mod output;
