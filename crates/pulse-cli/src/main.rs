mod upload;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pulse")]
#[command(about = "Rate-limit-aware market status poller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one rate-gated round over the given markets and print the results
    Check {
        /// Market ID to check (repeatable)
        #[arg(long = "market", required = true, num_args = 1..)]
        markets: Vec<String>,
    },
    /// Probe the remote rate budget once
    RateLimit,
    /// Poll the given markets on the configured interval until Ctrl-C
    Watch {
        /// Market ID to watch (repeatable)
        #[arg(long = "market", required = true, num_args = 1..)]
        markets: Vec<String>,
        /// Seconds between status reports (defaults to the poll interval)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        report_every_secs: Option<u64>,
    },
    /// PUT a file to a URL, retrying transient failures
    Upload {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        url: String,
        /// Override `PULSE_RETRY_MAX_RETRIES` for this upload
        #[arg(long)]
        max_retries: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = pulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { markets } => watch::run_check(&config, &markets).await,
        Commands::RateLimit => watch::run_rate_limit(&config).await,
        Commands::Watch {
            markets,
            report_every_secs,
        } => watch::run_watch(&config, markets, report_every_secs).await,
        Commands::Upload {
            file,
            url,
            max_retries,
        } => upload::run_upload(&config, &file, &url, max_retries).await,
    }
}

/// Writes `value` to stdout as one JSON line.
fn print_json_line<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "failed to serialize output line"),
    }
}
