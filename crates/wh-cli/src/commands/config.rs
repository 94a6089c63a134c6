//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use wh_core::config::{self, ConfigFile};
use wh_core::HostOptions;

fn resolve_path(config_path: Option<&PathBuf>) -> PathBuf {
    config_path.cloned().unwrap_or_else(config::default_config_path)
}

/// Load host options from `config_path`, or from the default file if it exists
///
/// An explicit path must exist and parse. A broken default file is reported
/// and replaced by the built-in defaults.
pub fn load_host_options(config_path: Option<&Path>) -> Result<HostOptions> {
    if let Some(path) = config_path {
        let file: ConfigFile = config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?;
        return Ok(file.host);
    }

    let default_path = config::default_config_path();
    if !default_path.exists() {
        tracing::debug!("Using default host options");
        return Ok(HostOptions::default());
    }

    match config::load_config::<ConfigFile>(&default_path) {
        Ok(file) => Ok(file.host),
        Err(e) => {
            tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
            Ok(HostOptions::default())
        }
    }
}

/// Show current configuration
pub fn config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let path = resolve_path(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'workerhost config init' to create one");
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Print one value by dotted key, e.g. `host.worker.executable`
pub fn config_get(config_path: Option<&PathBuf>, key: &str) -> Result<()> {
    let path = resolve_path(config_path);

    // Missing files fall back to the defaults so every key can be inspected
    let mut current = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let table: toml::Table = toml::from_str(&content).context("Failed to parse config file")?;
        toml::Value::Table(table)
    } else {
        toml::Value::try_from(ConfigFile::default()).context("Failed to render defaults")?
    };

    for part in key.split('.') {
        current = match current {
            toml::Value::Table(mut t) => match t.remove(part) {
                Some(v) => v,
                None => anyhow::bail!("Key not found: {}", key),
            },
            _ => anyhow::bail!("Key not found: {}", key),
        };
    }

    match &current {
        toml::Value::String(s) => println!("{}", s),
        toml::Value::Table(_) => println!("{}", toml::to_string_pretty(&current)?),
        other => println!("{}", other),
    }

    Ok(())
}

/// Write a commented default configuration file
pub fn config_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let config_file = resolve_path(config_path);

    if let Some(dir) = config_file.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
            print_success(&format!("Created config directory: {:?}", dir));
        }
    }

    if config_file.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", config_file));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    std::fs::write(&config_file, generate_default_config())
        .with_context(|| format!("Failed to write config file: {:?}", config_file))?;

    print_success(&format!("Created configuration file: {:?}", config_file));
    Ok(())
}

fn generate_default_config() -> String {
    r#"# workerhost configuration

[host]
# Per-invocation timeout in milliseconds (0 or negative disables it)
timeout_ms = 60000

# Extra attempts after a timeout or transport failure
num_retries = 0

# How long to wait for a killed worker to exit, in milliseconds
shutdown_grace_ms = 1000

[host.worker]
# Interpreter used to run the worker script
executable = "node"

# Arguments placed before the script
args = []

# Flag introducing inline script text; remove to pass the script bare
script_flag = "-e"

# Worker script, resolved against --script-dir
script_identifier = "worker.js"

# Port the worker binds (0 picks a free port)
port = 0

# working_dir = "/path/to/project"

[host.worker.env]
# NODE_ENV = "production"
"#
    .to_string()
}
