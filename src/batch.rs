//! # Batch Driver Module
//!
//! Processes many recordings in parallel. Recordings are independent, so each
//! worker thread runs the whole read → pipeline → write sequence for one file
//! at a time.
//!
//! ## Threading
//! ```text
//!             ┌──► worker 1 ──┐
//! job queue ──┼──► worker 2 ──┼──► result channel ──► outcomes
//!             └──► worker N ──┘
//! ```
//! Workers exit when the job queue is drained and closed. A failed recording
//! is logged and reported in its outcome; the rest of the batch continues.

use crate::config::{Config, OutputFormat};
use crate::error::RecordingError;
use crate::export::{format_time, output_path, write_results};
use crate::ingest::{is_supported, read_recording};
use crate::pipeline::Pipeline;
use crate::recording::ChannelId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

/// Where and how results are written
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Beside each input when `None`
    pub output_dir: Option<PathBuf>,
    pub format: OutputFormat,
    pub suffix: String,
    pub workers: usize,
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: None,
            format: config.output.format,
            suffix: config.output.suffix.clone(),
            workers: config.batch.workers.unwrap_or_else(default_workers),
        }
    }
}

fn default_workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Summary of one processed recording
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFile {
    pub output: PathBuf,
    pub rows: usize,
    pub hr_rows: usize,
    pub rr_rows: usize,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub result: Result<ProcessedFile, RecordingError>,
}

/// Recordings to process for `input`: the file itself, or the supported
/// files directly inside a directory. Earlier results (stem ending in
/// `suffix`) are skipped.
pub fn discover(input: &Path, suffix: &str) -> Result<Vec<PathBuf>, RecordingError> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        let is_result = !suffix.is_empty()
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map_or(false, |stem| stem.ends_with(suffix));
        if path.is_file() && is_supported(&path) && !is_result {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read, process and write one recording
pub fn process_file(
    input: &Path,
    config: &Config,
    options: &BatchOptions,
) -> Result<ProcessedFile, RecordingError> {
    log::info!("Reading {}", input.display());
    let recording = read_recording(input)?;
    log::info!(
        "Recording {}: {} to {}",
        input.display(),
        format_time(recording.start()),
        format_time(recording.end())
    );
    log::info!(
        "Sample rates: ECG {:.1} Hz, accelerometer {:.1} Hz",
        recording.sample_rates().rate(ChannelId::Ecg)?,
        recording.sample_rates().rate(ChannelId::AccX)?
    );

    let pipeline = Pipeline::new(config.heart_rate.clone(), config.respiration.clone());
    let table = pipeline.run(&recording)?;
    if table.is_empty() {
        log::warn!("{}: no output rows", input.display());
    }

    if let Some(dir) = &options.output_dir {
        fs::create_dir_all(dir)?;
    }
    let output = output_path(
        input,
        options.output_dir.as_deref(),
        &options.suffix,
        options.format,
    );
    log::info!("Writing {}", output.display());
    write_results(&output, &table, options.format)?;

    let (hr_rows, rr_rows) = table.coverage();
    Ok(ProcessedFile {
        output,
        rows: table.len(),
        hr_rows,
        rr_rows,
    })
}

fn worker_loop(
    job_rx: Receiver<(usize, PathBuf)>,
    result_tx: Sender<(usize, FileOutcome)>,
    config: &Config,
    options: &BatchOptions,
) {
    for (index, input) in job_rx.iter() {
        let result = process_file(&input, config, options);
        if let Err(e) = &result {
            log::error!("Failed to process {}: {}", input.display(), e);
        }
        if result_tx.send((index, FileOutcome { input, result })).is_err() {
            break;
        }
    }
}

/// Process every input on a pool of worker threads. Outcomes come back in
/// input order.
pub fn run_batch(inputs: Vec<PathBuf>, config: &Config, options: &BatchOptions) -> Vec<FileOutcome> {
    let total = inputs.len();
    let workers = options.workers.clamp(1, total.max(1));
    log::info!("Processing {} recording(s) on {} worker(s)", total, workers);

    let (job_tx, job_rx) = unbounded();
    let (result_tx, result_rx) = unbounded();
    for job in inputs.into_iter().enumerate() {
        job_tx
            .send(job)
            .expect("job receiver is held until the workers finish");
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || worker_loop(job_rx, result_tx, config, options));
        }
    });
    drop(result_tx);

    let mut outcomes: Vec<(usize, FileOutcome)> = result_rx.iter().collect();
    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Log the batch result; true when every recording succeeded
pub fn summarize(outcomes: &[FileOutcome]) -> bool {
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    for outcome in outcomes {
        if let Ok(processed) = &outcome.result {
            log::info!(
                "{} -> {} ({} rows, {} with HR, {} with RR)",
                outcome.input.display(),
                processed.output.display(),
                processed.rows,
                processed.hr_rows,
                processed.rr_rows
            );
        }
    }
    log::info!(
        "Done: {} succeeded, {} failed",
        outcomes.len() - failed,
        failed
    );
    failed == 0
}
