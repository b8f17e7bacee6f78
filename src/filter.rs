//! # Band-pass Filter Module
//!
//! Butterworth band-pass design and causal application for ECG conditioning.
//!
//! ## Design Route
//! 1. Analog low-pass prototype: N poles evenly spaced on the left half of
//!    the unit circle, no zeros
//! 2. Low-pass to band-pass transform around the pre-warped band edges,
//!    giving 2N poles and N zeros at the origin
//! 3. Bilinear transform to the z-plane; the N zeros at infinity land on -1
//! 4. Expand poles and zeros into `b`/`a` polynomials
//!
//! Pre-warping puts the -3 dB points exactly on the requested cutoffs.
//!
//! ## Application
//! `apply` runs the recursion in transposed direct form II starting from a
//! zero state, so it is causal and length preserving.

use crate::error::PipelineError;
use num_complex::Complex64;
use std::f64::consts::PI;

pub const DEFAULT_ORDER: usize = 2;

/// Digital filter coefficients, `a[0]` normalized to 1
#[derive(Debug, Clone, PartialEq)]
pub struct BandpassFilter {
    b: Vec<f64>,
    a: Vec<f64>,
}

impl BandpassFilter {
    /// Design a Butterworth band-pass filter.
    ///
    /// # Arguments
    /// * `low_cut_hz` - Lower -3 dB frequency in Hz
    /// * `high_cut_hz` - Upper -3 dB frequency in Hz
    /// * `sample_rate_hz` - Sampling rate of the data to be filtered
    /// * `order` - Prototype order; the band-pass has twice as many poles
    pub fn design(
        low_cut_hz: f64,
        high_cut_hz: f64,
        sample_rate_hz: f64,
        order: usize,
    ) -> Result<Self, PipelineError> {
        if !(sample_rate_hz > 0.0) {
            return Err(PipelineError::Configuration(format!(
                "sample rate must be positive, got {} Hz",
                sample_rate_hz
            )));
        }
        if order == 0 {
            return Err(PipelineError::Configuration(
                "filter order must be at least 1".to_string(),
            ));
        }
        let nyquist = 0.5 * sample_rate_hz;
        if !(low_cut_hz > 0.0) || !(low_cut_hz < high_cut_hz) {
            return Err(PipelineError::Configuration(format!(
                "band edges must satisfy 0 < low < high, got {} Hz .. {} Hz",
                low_cut_hz, high_cut_hz
            )));
        }
        if high_cut_hz >= nyquist {
            return Err(PipelineError::Configuration(format!(
                "high cut {} Hz must be below the Nyquist frequency {} Hz",
                high_cut_hz, nyquist
            )));
        }

        // Normalized to Nyquist, then pre-warped for a bilinear transform at fs = 2
        let warp = |normalized: f64| 4.0 * (PI * normalized / 2.0).tan();
        let low = warp(low_cut_hz / nyquist);
        let high = warp(high_cut_hz / nyquist);
        let bandwidth = high - low;
        let center = (low * high).sqrt();

        let prototype: Vec<Complex64> = (0..order)
            .map(|k| {
                let m = (2 * k + 1) as f64 - order as f64;
                -Complex64::from_polar(1.0, PI * m / (2.0 * order as f64))
            })
            .collect();

        let mut poles = Vec::with_capacity(2 * order);
        for p in &prototype {
            let scaled = *p * bandwidth / 2.0;
            let offset = (scaled * scaled - center * center).sqrt();
            poles.push(scaled + offset);
            poles.push(scaled - offset);
        }
        let zeros = vec![Complex64::new(0.0, 0.0); order];
        let gain = bandwidth.powi(order as i32);

        // Bilinear transform with 2 * fs = 4
        let fs2 = Complex64::new(4.0, 0.0);
        let mut digital_zeros: Vec<Complex64> =
            zeros.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
        digital_zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(order));
        let digital_poles: Vec<Complex64> = poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();

        let numerator: Complex64 = zeros.iter().map(|&z| fs2 - z).product();
        let denominator: Complex64 = poles.iter().map(|&p| fs2 - p).product();
        let digital_gain = gain * (numerator / denominator).re;

        let b = expand_roots(&digital_zeros)
            .into_iter()
            .map(|c| digital_gain * c.re)
            .collect();
        let a = expand_roots(&digital_poles).into_iter().map(|c| c.re).collect();

        Ok(Self { b, a })
    }

    /// Feed-forward coefficients
    pub fn b(&self) -> &[f64] {
        &self.b
    }

    /// Feedback coefficients, `a[0] == 1`
    pub fn a(&self) -> &[f64] {
        &self.a
    }

    /// Filter `data` causally from a zero initial state
    pub fn apply(&self, data: &[f64]) -> Vec<f64> {
        let taps = self.a.len().max(self.b.len());
        let a0 = self.a[0];
        let coeff = |v: &[f64], i: usize| v.get(i).copied().unwrap_or(0.0) / a0;

        let mut state = vec![0.0; taps.saturating_sub(1)];
        let mut out = Vec::with_capacity(data.len());
        for &x in data {
            let y = coeff(&self.b, 0) * x + state.first().copied().unwrap_or(0.0);
            for i in 0..state.len() {
                let carried = state.get(i + 1).copied().unwrap_or(0.0);
                state[i] = coeff(&self.b, i + 1) * x + carried - coeff(&self.a, i + 1) * y;
            }
            out.push(y);
        }
        out
    }
}

/// Coefficients of the monic polynomial with the given roots, highest power first
fn expand_roots(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, c) in coeffs.iter().enumerate() {
            next[i] += *c;
            next[i + 1] -= *c * *root;
        }
        coeffs = next;
    }
    coeffs
}
