//! # Respiratory Rate Estimator Module
//!
//! Breathing moves the chest, and the chest moves the accelerometer. The
//! sum of the three normalized axes carries that motion as a slow
//! oscillation whose dominant frequency is the respiratory rate.
//!
//! Each window is centred on its median and the strongest non-DC bin of its
//! amplitude spectrum, in Hz × 60, is the rate in breaths per minute.
//!
//! ## Stride Reference
//! Window length is measured in accelerometer samples, but the step between
//! windows is `calc_every_seconds × stride_reference_rate` samples. With the
//! default stride reference (the heart rate grid, 100 Hz) and a 25 Hz
//! accelerometer, windows advance every 20 s of accelerometer data rather
//! than every 5 s. Setting `stride_reference_hz` to the accelerometer rate
//! makes the step a true `calc_every_seconds`.

use crate::error::PipelineError;
use crate::recording::AccelSample;
use crate::spectrum::spectrum;
use crate::timeseries::{median, pad_forward, Estimate, TimeSeries, NANOS_PER_SECOND};
use serde::{Deserialize, Serialize};

/// Respiratory rate estimation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RespirationConfig {
    /// Analysis window length in seconds of accelerometer data
    pub window_seconds: u32,
    /// Window step, in units of the stride reference rate
    pub calc_every_seconds: u32,
    /// Overrides the stride reference; defaults to the heart rate grid rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stride_reference_hz: Option<f64>,
}

impl Default for RespirationConfig {
    fn default() -> Self {
        Self {
            window_seconds: 25,
            calc_every_seconds: 5,
            stride_reference_hz: None,
        }
    }
}

impl RespirationConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.window_seconds == 0 || self.calc_every_seconds == 0 {
            return Err(PipelineError::Configuration(format!(
                "respiration window ({} s) and step ({} s) must be positive",
                self.window_seconds, self.calc_every_seconds
            )));
        }
        if let Some(rate) = self.stride_reference_hz {
            if !(rate > 0.0) {
                return Err(PipelineError::Configuration(format!(
                    "stride reference rate must be positive, got {} Hz",
                    rate
                )));
            }
        }
        Ok(())
    }
}

/// Result of respiratory rate estimation
#[derive(Debug, Clone)]
pub struct Respiration {
    /// One estimate per window, breaths per minute
    pub estimates: Vec<Estimate>,
    /// Estimates held forward onto a 1 Hz grid
    pub padded: TimeSeries<Option<f64>>,
}

pub struct RespirationEstimator {
    config: RespirationConfig,
}

impl RespirationEstimator {
    pub fn new() -> Self {
        Self::with_config(RespirationConfig::default())
    }

    pub fn with_config(config: RespirationConfig) -> Self {
        Self { config }
    }

    /// Estimate respiratory rate from normalized acceleration.
    ///
    /// `default_stride_reference` is used unless the config overrides it.
    /// Like the heart rate windows, each window is stamped at the sample just
    /// after its last one (`i + window`).
    pub fn estimate(
        &self,
        acceleration: &TimeSeries<AccelSample>,
        default_stride_reference: f64,
    ) -> Result<Respiration, PipelineError> {
        self.config.validate()?;
        let stride_reference = self
            .config
            .stride_reference_hz
            .unwrap_or(default_stride_reference);
        if !(stride_reference > 0.0) {
            return Err(PipelineError::Configuration(format!(
                "stride reference rate must be positive, got {} Hz",
                stride_reference
            )));
        }

        let rate = acceleration.sample_rate();
        let window = (self.config.window_seconds as f64 * rate).round() as usize;
        let step = (self.config.calc_every_seconds as f64 * stride_reference).round() as usize;
        if window == 0 || step == 0 {
            return Err(PipelineError::Configuration(format!(
                "respiration window of {} samples with a step of {} samples is empty",
                window, step
            )));
        }

        let sums: Vec<f64> = acceleration.values().iter().map(AccelSample::sum).collect();

        let mut estimates = Vec::new();
        let mut start = 0;
        while start + window < sums.len() {
            let samples = &sums[start..start + window];
            estimates.push(Estimate {
                time: acceleration.time_at(start + window),
                value: window_rate(samples, rate)?,
            });
            start += step;
        }

        if estimates.is_empty() {
            log::warn!(
                "Accelerometer too short for one {} s respiration window ({} samples at {} Hz)",
                self.config.window_seconds,
                sums.len(),
                rate
            );
        }
        log::debug!(
            "Respiration: {} windows of {} samples, step {} samples",
            estimates.len(),
            window,
            step
        );

        Ok(Respiration {
            padded: pad_forward(&estimates, NANOS_PER_SECOND),
            estimates,
        })
    }
}

impl Default for RespirationEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Breaths per minute for one window of acceleration sums
fn window_rate(samples: &[f64], sample_rate: f64) -> Result<Option<f64>, PipelineError> {
    let Some(center) = median(samples) else {
        return Ok(None);
    };
    let centered: Vec<f64> = samples.iter().map(|v| v - center).collect();
    let spectrum = spectrum(&centered, sample_rate)?;
    Ok(spectrum.peak_excluding_dc().map(|(freq, _)| freq * 60.0))
}
