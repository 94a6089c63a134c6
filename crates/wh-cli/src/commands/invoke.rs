//! Invoke command implementation

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::output::format_result;
use wh_core::{HostError, HostOptions};
use wh_host::{Json, ModuleStream, Supervisor};

/// Module to invoke
#[derive(Debug, Clone)]
pub enum InvokeSource {
    /// Module file resolved by the worker
    File(String),
    /// Inline module text
    Text {
        text: String,
        cache_id: Option<String>,
    },
    /// Module text read from standard input
    Stdin { cache_id: Option<String> },
    /// Previously cached module
    Cache(String),
}

/// Everything about an invocation besides the module
#[derive(Debug, Clone)]
pub struct InvokeSettings {
    pub export: Option<String>,
    pub args: Vec<Value>,
    /// Directory the worker script is read from
    pub script_dir: PathBuf,
    pub pretty: bool,
}

/// Parse positional arguments as JSON
///
/// Anything that is not valid JSON is passed as a string, so `hello` and
/// `"hello"` are equivalent.
pub fn parse_args(raw: &[String]) -> Vec<Value> {
    raw.iter()
        .map(|arg| serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone())))
        .collect()
}

/// Run one invocation and print its result
pub async fn invoke_command(
    options: HostOptions,
    source: InvokeSource,
    settings: InvokeSettings,
) -> Result<()> {
    let supervisor = Supervisor::with_script_dir(options, settings.script_dir.clone());

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, cancelling invocation");
            signal_token.cancel();
        }
    });

    let result = run(&supervisor, source.clone(), &settings, &cancel).await;

    signal.abort();
    supervisor.dispose().await;

    let value = match result {
        Ok(value) => value,
        Err(HostError::Invocation { message, stack }) => {
            if !stack.is_empty() {
                tracing::debug!("Worker stack:\n{}", stack);
            }
            anyhow::bail!("Worker reported an error: {}", message);
        }
        Err(e) => return Err(e).context("Invocation failed"),
    };

    match value {
        Some(value) => {
            println!("{}", format_result(&value, settings.pretty));
            Ok(())
        }
        None => match source {
            InvokeSource::Cache(id) => anyhow::bail!("Nothing is cached under {:?}", id),
            _ => anyhow::bail!("Worker returned no result"),
        },
    }
}

async fn run(
    supervisor: &Supervisor,
    source: InvokeSource,
    settings: &InvokeSettings,
    cancel: &CancellationToken,
) -> wh_core::Result<Option<Value>> {
    let export = settings.export.as_deref();
    let args = settings.args.clone();

    match source {
        InvokeSource::File(path) => supervisor
            .invoke_from_file::<Json<Value>>(path, export, args, Some(cancel))
            .await
            .map(Some),
        InvokeSource::Text { text, cache_id } => supervisor
            .invoke_from_string::<Json<Value>>(text, cache_id.as_deref(), export, args, Some(cancel))
            .await
            .map(Some),
        InvokeSource::Stdin { cache_id } => {
            let stream: ModuleStream = Box::new(tokio::io::stdin());
            supervisor
                .invoke_from_stream::<Json<Value>>(stream, cache_id.as_deref(), export, args, Some(cancel))
                .await
                .map(Some)
        }
        InvokeSource::Cache(id) => {
            supervisor
                .try_invoke_from_cache::<Json<Value>>(id, export, args, Some(cancel))
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_args() {
        let raw = vec![
            "1".to_string(),
            "{\"a\":true}".to_string(),
            "hello".to_string(),
            "\"quoted\"".to_string(),
            "[1, 2]".to_string(),
        ];

        assert_eq!(
            parse_args(&raw),
            vec![json!(1), json!({"a": true}), json!("hello"), json!("quoted"), json!([1, 2])]
        );
    }

    #[test]
    fn test_parse_no_args() {
        assert!(parse_args(&[]).is_empty());
    }
}
