//! workerhost CLI
//!
//! Runs module exports inside a supervised worker process:
//! - `invoke` starts the worker, sends one invocation and prints the result
//! - `config` manages the host configuration file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use workerhost::commands::{self, InvokeSettings, InvokeSource};
use workerhost::output::print_error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "workerhost")]
#[command(author, version, about = "Invoke modules in a supervised worker process")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "WORKERHOST_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Invoke a module export in the worker
    Invoke {
        #[command(subcommand)]
        source: SourceCommand,

        #[command(flatten)]
        options: InvokeArgs,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SourceCommand {
    /// Invoke a module file, resolved by the worker
    File { path: String },
    /// Invoke inline module text
    String {
        text: String,
        /// Cache the module under this identifier
        #[arg(long)]
        cache_id: Option<String>,
    },
    /// Invoke module text read from standard input
    Stdin {
        /// Cache the module under this identifier
        #[arg(long)]
        cache_id: Option<String>,
    },
    /// Invoke a module cached by an earlier call
    Cache { id: String },
}

#[derive(Args)]
struct InvokeArgs {
    /// Export to call (the default export when omitted)
    #[arg(short, long, global = true)]
    export: Option<String>,

    /// Argument, parsed as JSON when possible (repeatable)
    #[arg(short, long = "arg", global = true)]
    args: Vec<String>,

    /// Directory containing the worker script
    #[arg(long, global = true, default_value = ".")]
    script_dir: PathBuf,

    /// Timeout in milliseconds (overrides config)
    #[arg(long, global = true)]
    timeout_ms: Option<i64>,

    /// Worker executable (overrides config)
    #[arg(long, global = true)]
    executable: Option<String>,

    /// Print JSON results on one line
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a config value by dotted key
    Get { key: String },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show config directory path
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            // Targets keep relayed worker output apart from host messages
            tracing_subscriber::fmt::layer().with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Invoke { source, options } => {
            let mut host = commands::load_host_options(cli.config.as_deref())?;
            if let Some(timeout_ms) = options.timeout_ms {
                host.timeout_ms = timeout_ms;
            }
            if let Some(executable) = options.executable {
                host.worker.executable = executable;
            }

            let source = match source {
                SourceCommand::File { path } => InvokeSource::File(path),
                SourceCommand::String { text, cache_id } => InvokeSource::Text { text, cache_id },
                SourceCommand::Stdin { cache_id } => InvokeSource::Stdin { cache_id },
                SourceCommand::Cache { id } => InvokeSource::Cache(id),
            };
            let settings = InvokeSettings {
                export: options.export,
                args: commands::parse_args(&options.args),
                script_dir: options.script_dir,
                pretty: !options.compact,
            };

            commands::invoke_command(host, source, settings).await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                commands::config_show(cli.config.as_ref())?;
            }
            ConfigAction::Get { key } => {
                commands::config_get(cli.config.as_ref(), &key)?;
            }
            ConfigAction::Init { force } => {
                commands::config_init(cli.config.as_ref(), force)?;
            }
            ConfigAction::Path => {
                let path = wh_core::config::default_config_dir();
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}
