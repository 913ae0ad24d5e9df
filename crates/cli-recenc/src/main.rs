use std::path::PathBuf;
use std::process::ExitCode;
use anyhow::{Context, Result};
use clap::Parser;
use log::error;
use recenc::{config::EncodeConfig, logging, run_exclusive, ProcessRunner, StopSignal};

/// Transcode recorded programs into the encoded library
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging and echo log lines to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            // the logger may not be up yet
            eprintln!("recenc: {:#}", e);
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<ExitCode> {
    let cfg = EncodeConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    logging::init(&cfg.log_dir, args.verbose)?;

    // installed before the lock is taken so a signal can never leave it behind
    let stop = StopSignal::install().context("Failed to install signal handlers")?;

    match run_exclusive(&cfg, &ProcessRunner, &stop).await {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(_) => Ok(ExitCode::FAILURE),
    }
}
