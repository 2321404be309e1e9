//! tracemesh - broker telemetry correlation
//!
//! # Usage
//!
//! ```bash
//! # Replay a recorded capture, one movement per stdout line
//! tracemesh replay --input capture.jsonl --config configs/brokers.toml
//! tracemesh replay --input capture.jsonl --speed 4
//!
//! # Validate a config and list the broker links
//! tracemesh check --config configs/brokers.toml
//! ```

mod cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracemesh_config::{Config, LogConfig, LogFormat, LogLevel, LogOutput};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// tracemesh - turn broker telemetry spans into broker-to-broker movements
#[derive(Parser, Debug)]
#[command(name = "tracemesh")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a JSON-lines capture through the engine
    Replay(cmd::replay::ReplayArgs),

    /// Validate configuration and print the broker links
    Check(cmd::check::CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Replay(args) => {
            let config = load_config(cli.config.as_deref())?;
            init_logging(&replay_log_config(&config, cli.log_level.as_deref())?)?;
            cmd::replay::run(args, config).await
        }
        Command::Check(args) => {
            // Check doesn't need logging - just outputs to stdout
            let path = cli
                .config
                .context("check needs a config file: tracemesh check --config <path>")?;
            cmd::check::run(&args, &path)
        }
    }
}

/// Load the config file, or defaults when none is given
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            Config::from_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

/// Resolve logging: CLI flag > config file > default "info"
fn resolve_log_config(config: &Config, cli_level: Option<&str>) -> Result<LogConfig> {
    let level = cli_level
        .map(str::parse::<LogLevel>)
        .transpose()
        .map_err(anyhow::Error::msg)?;
    Ok(config.log.clone().with_level(level))
}

/// Replay writes movement lines to stdout, so its logs always go to stderr
fn replay_log_config(config: &Config, cli_level: Option<&str>) -> Result<LogConfig> {
    Ok(resolve_log_config(config, cli_level)?.with_output(LogOutput::Stderr))
}

/// Initialize the tracing subscriber for logging
fn init_logging(log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(log.level.as_str())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let writer = match log.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    };
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(writer);

    match log.format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json())
            .with(filter)
            .init(),
    }

    Ok(())
}
