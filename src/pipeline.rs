//! # Pipeline Orchestrator Module
//!
//! Runs the three estimators over one recording and joins their output on
//! a single 1 Hz index.
//!
//! ## Master Index
//! The normalized accelerometer averaged into 1 s buckets defines the rows of
//! the output table. Heart rate and respiratory rate are each already held
//! forward onto 1 s grid points; a row takes the value stamped at exactly its
//! timestamp, or `None` when that estimator has nothing there.
//!
//! ## Data Flow
//! ```text
//! ECG ──► HeartRateEstimator ──► HR (1 Hz) ──────────────┐
//!              │ resampled rate (stride reference)       │
//!              ▼                                         ▼
//! ACC ──► normalize ──► RespirationEstimator ──► RR ──► join ──► OutputTable
//!              │                                         ▲
//!              └──► 1 s means ──► classify ──────────────┘
//! ```

use crate::error::PipelineError;
use crate::heart_rate::{HeartRateConfig, HeartRateEstimator};
use crate::position::{classify, BodyPosition};
use crate::recording::{AccelSample, Recording};
use crate::respiration::{RespirationConfig, RespirationEstimator};
use crate::timeseries::{TimeSeries, NANOS_PER_SECOND};

/// One row of the output table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputRow {
    /// Start of the 1 s bucket, ns since epoch
    pub time: u64,
    /// Respiratory rate, breaths per minute
    pub rr: Option<f64>,
    /// Heart rate, beats per minute
    pub hr: Option<f64>,
    pub position: BodyPosition,
    /// Degrees
    pub tilt: Option<f64>,
    /// Degrees
    pub rotation: Option<f64>,
}

/// Final 1 Hz table handed to export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTable {
    rows: Vec<OutputRow>,
}

impl OutputTable {
    pub fn rows(&self) -> &[OutputRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with a heart rate and rows with a respiratory rate
    pub fn coverage(&self) -> (usize, usize) {
        let hr = self.rows.iter().filter(|row| row.hr.is_some()).count();
        let rr = self.rows.iter().filter(|row| row.rr.is_some()).count();
        (hr, rr)
    }
}

impl From<Vec<OutputRow>> for OutputTable {
    fn from(rows: Vec<OutputRow>) -> Self {
        Self { rows }
    }
}

pub struct Pipeline {
    heart_rate: HeartRateConfig,
    respiration: RespirationConfig,
}

impl Pipeline {
    pub fn new(heart_rate: HeartRateConfig, respiration: RespirationConfig) -> Self {
        Self {
            heart_rate,
            respiration,
        }
    }

    /// Process one complete recording
    pub fn run(&self, recording: &Recording) -> Result<OutputTable, PipelineError> {
        let ecg = recording.ecg()?;
        let hr = HeartRateEstimator::with_config(self.heart_rate.clone()).estimate(&ecg)?;

        let acceleration = recording.normalized_acceleration()?;
        let rr = RespirationEstimator::with_config(self.respiration.clone())
            .estimate(&acceleration.samples, hr.resampled_rate)?;
        log::debug!(
            "{} HR and {} RR window estimates, gravity {:.3} raw units",
            hr.estimates.len(),
            rr.estimates.len(),
            acceleration.gravity
        );

        let (per_second, filled) = acceleration
            .samples
            // buckets handed to the reducer always hold at least one sample
            .resample_with(NANOS_PER_SECOND, |bucket| {
                AccelSample::mean(bucket).unwrap_or_default()
            })
            .hold_gaps();
        if filled > 0 {
            log::warn!(
                "Accelerometer: {} empty 1 s buckets held from the previous second",
                filled
            );
        }

        warn_unaligned("HR", &hr.padded, &per_second);
        warn_unaligned("RR", &rr.padded, &per_second);

        let rows = per_second
            .iter()
            .map(|(time, sample)| {
                let orientation = classify(*sample);
                OutputRow {
                    time,
                    rr: rr.padded.value_at(time).copied().flatten(),
                    hr: hr.padded.value_at(time).copied().flatten(),
                    position: orientation.position,
                    tilt: orientation.tilt,
                    rotation: orientation.rotation,
                }
            })
            .collect();

        let table = OutputTable { rows };
        let (hr_rows, rr_rows) = table.coverage();
        log::debug!(
            "Output table: {} rows, {} with HR, {} with RR",
            table.len(),
            hr_rows,
            rr_rows
        );
        Ok(table)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(HeartRateConfig::default(), RespirationConfig::default())
    }
}

/// Estimates on grid points the accelerometer does not cover are not joined
fn warn_unaligned<T>(name: &str, padded: &TimeSeries<Option<f64>>, index: &TimeSeries<T>) {
    let dropped = padded
        .iter()
        .filter(|(time, value)| value.is_some() && index.value_at(*time).is_none())
        .count();
    if dropped > 0 {
        log::warn!(
            "{}: {} padded estimates fall outside the accelerometer's 1 Hz index",
            name,
            dropped
        );
    }
}
