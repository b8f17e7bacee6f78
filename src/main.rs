mod batch;
mod config;
mod error;
mod export;
mod filter;
mod heart_rate;
mod ingest;
mod pipeline;
mod position;
mod recording;
mod respiration;
mod spectrum;
mod timeseries;

use batch::{discover, run_batch, summarize, BatchOptions};
use clap::Parser;
use config::{Config, OutputFormat};
use std::path::PathBuf;
use std::process::ExitCode;

/// Heart rate, respiratory rate and body position from chest-strap Holter
/// recordings
#[derive(Parser, Debug)]
#[command(name = "zen-holter", version, long_about = None)]
struct Args {
    /// Recording file, or a directory of recordings
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Write results here instead of beside each recording
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// TOML configuration file; the per-user config is used otherwise
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Worker threads (overrides `batch.workers`)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Result format, csv or hdf5 (overrides `output.format`)
    #[arg(short, long)]
    format: Option<OutputFormat>,
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            match Config::load_from(path) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Failed to load {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => Config::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        }),
    };

    if let Some(workers) = args.workers {
        config.batch.workers = Some(workers);
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Err(e) = config.validate() {
        log::error!("{}", e);
        return ExitCode::FAILURE;
    }

    let options = BatchOptions {
        output_dir: args.output_dir,
        ..BatchOptions::from_config(&config)
    };

    let inputs = match discover(&args.input, &options.suffix) {
        Ok(inputs) => inputs,
        Err(e) => {
            log::error!("Cannot read {}: {}", args.input.display(), e);
            return ExitCode::FAILURE;
        }
    };
    if inputs.is_empty() {
        log::warn!("No recordings found in {}", args.input.display());
    }

    let outcomes = run_batch(inputs, &config, &options);
    if summarize(&outcomes) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
