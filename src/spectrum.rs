//! # Spectrum Analyzer Module
//!
//! One-sided amplitude spectrum of a real window and its dominant bin.
//! No taper is applied; callers remove DC themselves (the respiration
//! estimator subtracts the window median).

use crate::error::PipelineError;
use num_complex::Complex64;
use rustfft::FftPlanner;

/// Amplitudes are reported in thousandths of the raw FFT magnitude
const AMPLITUDE_SCALE: f64 = 1.0 / 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Scaled magnitude per bin, `n / 2 + 1` bins
    pub amplitudes: Vec<f64>,
    /// Bin centre frequencies in Hz
    pub frequencies: Vec<f64>,
    /// Frequency of the strongest bin, DC included
    pub peak_frequency: f64,
    /// Scaled magnitude of the strongest bin
    pub peak_amplitude: f64,
    /// Hz between adjacent bins, `sample_rate / n`
    pub resolution: f64,
}

impl Spectrum {
    /// Strongest bin above DC as (frequency, amplitude).
    ///
    /// Returns `None` when there is no bin above DC or the spectrum is flat zero.
    pub fn peak_excluding_dc(&self) -> Option<(f64, f64)> {
        let (index, amplitude) = argmax(self.amplitudes.get(1..)?)?;
        if amplitude <= 0.0 {
            return None;
        }
        Some(((index + 1) as f64 * self.resolution, amplitude))
    }
}

/// First index of the largest value
fn argmax(values: &[f64]) -> Option<(usize, f64)> {
    values.iter().copied().enumerate().fold(None, |best, (i, v)| match best {
        Some((_, best_v)) if best_v >= v => best,
        _ => Some((i, v)),
    })
}

/// Forward real FFT of `signal` sampled at `sample_rate` Hz
pub fn spectrum(signal: &[f64], sample_rate: f64) -> Result<Spectrum, PipelineError> {
    if signal.is_empty() {
        return Err(PipelineError::InvalidInput(
            "cannot take the spectrum of an empty window".to_string(),
        ));
    }
    if !(sample_rate > 0.0) {
        return Err(PipelineError::Configuration(format!(
            "sample rate must be positive, got {} Hz",
            sample_rate
        )));
    }

    let n = signal.len();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    fft.process(&mut buffer);

    let bins = n / 2 + 1;
    let resolution = sample_rate / n as f64;
    let magnitudes: Vec<f64> = buffer.iter().take(bins).map(|c| c.norm()).collect();
    let frequencies = (0..bins).map(|k| k as f64 * resolution).collect();

    let (peak_index, peak_magnitude) = argmax(&magnitudes).unwrap_or((0, 0.0));

    Ok(Spectrum {
        amplitudes: magnitudes.iter().map(|m| m * AMPLITUDE_SCALE).collect(),
        frequencies,
        peak_frequency: peak_index as f64 * resolution,
        peak_amplitude: peak_magnitude * AMPLITUDE_SCALE,
        resolution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_bin_layout() {
        let s = spectrum(&vec![0.0; 10], 20.0).unwrap();
        assert_eq!(s.amplitudes.len(), 6);
        assert_eq!(s.frequencies.len(), 6);
        assert_abs_diff_eq!(s.resolution, 2.0);
        assert_abs_diff_eq!(s.frequencies[5], 10.0);
    }

    #[test]
    fn test_peak_on_exact_bin() {
        // 5 Hz at 100 Hz over 200 samples -> bin 10, magnitude n/2
        let s = spectrum(&sine(5.0, 100.0, 200), 100.0).unwrap();
        assert_abs_diff_eq!(s.peak_frequency, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(s.peak_amplitude, 100.0 / 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_peak_within_one_bin_off_grid() {
        let rate = 25.0;
        for freq in [0.23, 0.31, 1.7, 4.05] {
            let s = spectrum(&sine(freq, rate, 625), rate).unwrap();
            assert!(
                (s.peak_frequency - freq).abs() <= s.resolution,
                "peak {} Hz too far from {} Hz",
                s.peak_frequency,
                freq
            );
        }
    }

    #[test]
    fn test_single_period_window() {
        let s = spectrum(&sine(2.0, 64.0, 32), 64.0).unwrap();
        assert_abs_diff_eq!(s.peak_frequency, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_peak_excluding_dc() {
        let signal: Vec<f64> = sine(5.0, 100.0, 200).iter().map(|v| v + 10.0).collect();
        let s = spectrum(&signal, 100.0).unwrap();
        // DC dominates the full argmax
        assert_abs_diff_eq!(s.peak_frequency, 0.0);
        let (freq, _) = s.peak_excluding_dc().unwrap();
        assert_abs_diff_eq!(freq, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_window_has_no_peak() {
        let s = spectrum(&vec![0.0; 64], 25.0).unwrap();
        assert_eq!(s.peak_excluding_dc(), None);
        let s = spectrum(&[1.0], 25.0).unwrap();
        assert_eq!(s.peak_excluding_dc(), None);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            spectrum(&[], 25.0),
            Err(PipelineError::InvalidInput(_))
        ));
        assert!(matches!(
            spectrum(&[1.0, 2.0], 0.0),
            Err(PipelineError::Configuration(_))
        ));
    }
}
