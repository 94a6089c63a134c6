//! CLI command implementations

mod config;
mod invoke;

pub use config::{config_get, config_init, config_show, load_host_options};
pub use invoke::{invoke_command, parse_args, InvokeSource, InvokeSettings};
