//! # Recording Module
//!
//! In-memory form of one Holter recording as handed over by ingestion:
//! the channel sample-rate map plus the raw values of each channel. Series
//! handed to the estimators are built at the rate the map records.
//!
//! ## Key Types
//! - `ChannelId`: the four channels the pipeline consumes
//! - `SampleRates`: channel label → sampling frequency (Hz)
//! - `AccelSample`: one (x, y, z) accelerometer reading
//! - `Recording`: validated ECG and accelerometer channels
//!
//! ## Gravity Normalization
//! The accelerometer is expressed in units of local gravity by dividing every
//! axis by the median magnitude over the whole recording. The median is taken
//! once, before any sample is scaled.

use crate::error::PipelineError;
use crate::timeseries::{median, Point, PointSliceExt, TimeSeries};
use std::collections::HashMap;
use std::ops::Add;

/// Channel identifier for routing data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Ecg,
    AccX,
    AccY,
    AccZ,
}

impl ChannelId {
    /// Channel label used in sample-rate maps and CSV recordings
    pub fn label(&self) -> &'static str {
        match self {
            ChannelId::Ecg => "ECG",
            ChannelId::AccX => "Accelerometer_X",
            ChannelId::AccY => "Accelerometer_Y",
            ChannelId::AccZ => "Accelerometer_Z",
        }
    }

    /// HDF5 group name for this channel
    pub fn group_name(&self) -> &'static str {
        match self {
            ChannelId::Ecg => "ecg",
            ChannelId::AccX => "acc_x",
            ChannelId::AccY => "acc_y",
            ChannelId::AccZ => "acc_z",
        }
    }

    /// Accepts either the label or the group name, ignoring case
    pub fn parse(name: &str) -> Option<ChannelId> {
        let name = name.trim();
        ChannelId::all().into_iter().find(|channel| {
            channel.label().eq_ignore_ascii_case(name) || channel.group_name().eq_ignore_ascii_case(name)
        })
    }

    /// Get all channel IDs
    pub fn all() -> Vec<ChannelId> {
        vec![
            ChannelId::Ecg,
            ChannelId::AccX,
            ChannelId::AccY,
            ChannelId::AccZ,
        ]
    }
}

/// Channel label → sampling frequency in Hz
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleRates {
    rates: HashMap<String, f64>,
}

impl SampleRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: impl Into<String>, rate_hz: f64) {
        self.rates.insert(channel.into(), rate_hz);
    }

    /// Rate for `channel`; a channel without an entry is an input error
    pub fn get(&self, channel: &str) -> Result<f64, PipelineError> {
        self.rates.get(channel).copied().ok_or_else(|| {
            PipelineError::InvalidInput(format!("no sample rate recorded for channel {}", channel))
        })
    }

    pub fn rate(&self, channel: ChannelId) -> Result<f64, PipelineError> {
        self.get(channel.label())
    }
}

/// One accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccelSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn sum(&self) -> f64 {
        self.x + self.y + self.z
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Each axis clipped to [-1, 1]
    pub fn clipped(&self) -> Self {
        Self::new(
            self.x.clamp(-1.0, 1.0),
            self.y.clamp(-1.0, 1.0),
            self.z.clamp(-1.0, 1.0),
        )
    }

    /// Component-wise mean; `None` for an empty slice
    pub fn mean(samples: &[AccelSample]) -> Option<AccelSample> {
        if samples.is_empty() {
            return None;
        }
        let total = samples.iter().copied().fold(AccelSample::default(), Add::add);
        Some(total.scaled(1.0 / samples.len() as f64))
    }
}

impl Add for AccelSample {
    type Output = AccelSample;

    fn add(self, other: AccelSample) -> AccelSample {
        AccelSample::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

/// Accelerometer in units of local gravity
#[derive(Debug, Clone)]
pub struct NormalizedAcceleration {
    /// Median raw magnitude used as 1 g
    pub gravity: f64,
    pub samples: TimeSeries<AccelSample>,
}

/// Raw values of one channel and the time of its first sample
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSamples {
    pub start: u64,
    pub values: Vec<f64>,
}

impl ChannelSamples {
    pub fn new(start: u64, values: Vec<f64>) -> Self {
        Self { start, values }
    }
}

/// Container for the channels of one recording.
///
/// Channel values carry no rate of their own; every series handed to an
/// estimator takes its rate from the sample-rate map.
#[derive(Debug, Clone)]
pub struct Recording {
    sample_rates: SampleRates,
    channels: HashMap<ChannelId, ChannelSamples>,
}

impl Recording {
    /// Every channel needs a positive rate in `sample_rates` and at least one
    /// value. The three accelerometer axes must share a rate and a length.
    pub fn new(
        sample_rates: SampleRates,
        channels: HashMap<ChannelId, ChannelSamples>,
    ) -> Result<Self, PipelineError> {
        for channel in ChannelId::all() {
            let rate = sample_rates.rate(channel)?;
            if !(rate > 0.0) {
                return Err(PipelineError::InvalidInput(format!(
                    "channel {} has a non-positive sample rate {}",
                    channel.label(),
                    rate
                )));
            }
            match channels.get(&channel) {
                None => {
                    return Err(PipelineError::InvalidInput(format!(
                        "recording has no {} channel",
                        channel.label()
                    )))
                }
                Some(samples) if samples.values.is_empty() => {
                    return Err(PipelineError::InvalidInput(format!(
                        "channel {} is empty",
                        channel.label()
                    )))
                }
                Some(_) => {}
            }
        }

        let axis_rates = [
            sample_rates.rate(ChannelId::AccX)?,
            sample_rates.rate(ChannelId::AccY)?,
            sample_rates.rate(ChannelId::AccZ)?,
        ];
        if axis_rates[1] != axis_rates[0] || axis_rates[2] != axis_rates[0] {
            return Err(PipelineError::InvalidInput(format!(
                "accelerometer axes differ in sample rate: x={}, y={}, z={} Hz",
                axis_rates[0], axis_rates[1], axis_rates[2]
            )));
        }
        let axis_len = |channel: ChannelId| channels.get(&channel).map_or(0, |c| c.values.len());
        let (x, y, z) = (
            axis_len(ChannelId::AccX),
            axis_len(ChannelId::AccY),
            axis_len(ChannelId::AccZ),
        );
        if x != y || x != z {
            return Err(PipelineError::InvalidInput(format!(
                "accelerometer axes differ in length: x={}, y={}, z={}",
                x, y, z
            )));
        }

        Ok(Self {
            sample_rates,
            channels,
        })
    }

    /// Build a recording from timestamped samples, inferring each channel's
    /// rate from its first and last timestamps
    pub fn from_points(channels: HashMap<ChannelId, Vec<Point>>) -> Result<Self, PipelineError> {
        let mut sample_rates = SampleRates::new();
        let mut samples = HashMap::new();

        for channel in ChannelId::all() {
            let points = channels.get(&channel).map(Vec::as_slice).unwrap_or(&[]);
            if points.len() < 2 {
                return Err(PipelineError::InvalidInput(format!(
                    "channel {} needs at least two samples, got {}",
                    channel.label(),
                    points.len()
                )));
            }
            if !points.is_strictly_increasing() {
                return Err(PipelineError::InvalidInput(format!(
                    "channel {} has non-increasing timestamps",
                    channel.label()
                )));
            }
            let rate = points.inferred_sample_rate().ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "cannot infer a sample rate for channel {}",
                    channel.label()
                ))
            })?;

            sample_rates.insert(channel.label(), rate);
            samples.insert(
                channel,
                ChannelSamples::new(points[0].time, points.iter().map(|p| p.value).collect()),
            );
        }

        Self::new(sample_rates, samples)
    }

    pub fn sample_rates(&self) -> &SampleRates {
        &self.sample_rates
    }

    fn samples(&self, channel: ChannelId) -> Result<&ChannelSamples, PipelineError> {
        self.channels.get(&channel).ok_or_else(|| {
            PipelineError::InvalidInput(format!("recording has no {} channel", channel.label()))
        })
    }

    /// One channel as a series at its mapped rate
    pub fn series(&self, channel: ChannelId) -> Result<TimeSeries<f64>, PipelineError> {
        let rate = self.sample_rates.rate(channel)?;
        let samples = self.samples(channel)?;
        Ok(TimeSeries::new(samples.start, rate, samples.values.clone()))
    }

    pub fn ecg(&self) -> Result<TimeSeries<f64>, PipelineError> {
        self.series(ChannelId::Ecg)
    }

    /// Recording start (the ECG's first timestamp)
    pub fn start(&self) -> u64 {
        self.channels
            .get(&ChannelId::Ecg)
            .map_or(0, |samples| samples.start)
    }

    /// Recording end (the ECG's last timestamp)
    pub fn end(&self) -> u64 {
        self.ecg()
            .ok()
            .and_then(|ecg| ecg.end_time())
            .unwrap_or_else(|| self.start())
    }

    /// Raw accelerometer readings zipped into samples at the X axis rate
    pub fn raw_acceleration(&self) -> Result<TimeSeries<AccelSample>, PipelineError> {
        let rate = self.sample_rates.rate(ChannelId::AccX)?;
        let x = self.samples(ChannelId::AccX)?;
        let y = self.samples(ChannelId::AccY)?;
        let z = self.samples(ChannelId::AccZ)?;
        let samples = x
            .values
            .iter()
            .zip(&y.values)
            .zip(&z.values)
            .map(|((&x, &y), &z)| AccelSample::new(x, y, z))
            .collect();
        Ok(TimeSeries::new(x.start, rate, samples))
    }

    /// Accelerometer scaled so the median magnitude reads 1 g
    pub fn normalized_acceleration(&self) -> Result<NormalizedAcceleration, PipelineError> {
        let raw = self.raw_acceleration()?;
        let magnitudes: Vec<f64> = raw.values().iter().map(AccelSample::magnitude).collect();
        let gravity = median(&magnitudes).ok_or_else(|| {
            PipelineError::InvalidInput("accelerometer channels are empty".to_string())
        })?;
        if !gravity.is_finite() || gravity <= 0.0 {
            return Err(PipelineError::InvalidInput(format!(
                "median acceleration magnitude must be positive, got {}",
                gravity
            )));
        }

        Ok(NormalizedAcceleration {
            gravity,
            samples: raw.map(|sample| sample.scaled(1.0 / gravity)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn rates(ecg: f64, acc: f64) -> SampleRates {
        let mut rates = SampleRates::new();
        rates.insert("ECG", ecg);
        rates.insert("Accelerometer_X", acc);
        rates.insert("Accelerometer_Y", acc);
        rates.insert("Accelerometer_Z", acc);
        rates
    }

    fn channels(
        ecg: Vec<f64>,
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
    ) -> HashMap<ChannelId, ChannelSamples> {
        HashMap::from([
            (ChannelId::Ecg, ChannelSamples::new(0, ecg)),
            (ChannelId::AccX, ChannelSamples::new(0, x)),
            (ChannelId::AccY, ChannelSamples::new(0, y)),
            (ChannelId::AccZ, ChannelSamples::new(0, z)),
        ])
    }

    #[test]
    fn test_channel_labels_round_trip() {
        for channel in ChannelId::all() {
            assert_eq!(ChannelId::parse(channel.label()), Some(channel));
            assert_eq!(ChannelId::parse(channel.group_name()), Some(channel));
        }
        assert_eq!(ChannelId::parse("ecg"), Some(ChannelId::Ecg));
        assert_eq!(ChannelId::parse("Temperature"), None);
    }

    #[test]
    fn test_missing_sample_rate_is_input_error() {
        let rates = SampleRates::new();
        assert!(matches!(rates.get("ECG"), Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_new_rejects_missing_channel() {
        let mut chans = channels(vec![0.0; 4], vec![1.0; 2], vec![0.0; 2], vec![0.0; 2]);
        chans.remove(&ChannelId::AccY);
        let result = Recording::new(rates(100.0, 25.0), chans);
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_new_rejects_channel_without_rate() {
        let chans = channels(vec![0.0; 4], vec![1.0; 2], vec![0.0; 2], vec![0.0; 2]);
        let mut partial = SampleRates::new();
        partial.insert("ECG", 100.0);
        partial.insert("Accelerometer_X", 25.0);
        partial.insert("Accelerometer_Y", 25.0);
        assert!(matches!(
            Recording::new(partial, chans),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_series_take_rates_from_map() {
        let chans = channels(vec![0.0; 4], vec![1.0; 2], vec![0.0; 2], vec![0.0; 2]);
        let recording = Recording::new(rates(250.0, 25.0), chans).unwrap();
        assert_eq!(recording.ecg().unwrap().sample_rate(), 250.0);
        assert_eq!(recording.raw_acceleration().unwrap().sample_rate(), 25.0);
        assert_eq!(
            recording.sample_rates().rate(ChannelId::AccY).unwrap(),
            recording.raw_acceleration().unwrap().sample_rate()
        );
    }

    #[test]
    fn test_new_rejects_axes_at_different_rates() {
        let chans = channels(vec![0.0; 4], vec![1.0; 2], vec![0.0; 2], vec![0.0; 2]);
        let mut mixed = rates(100.0, 25.0);
        mixed.insert("Accelerometer_Z", 50.0);
        assert!(Recording::new(mixed, chans).is_err());
    }

    #[test]
    fn test_new_rejects_unequal_axes() {
        let chans = channels(vec![0.0; 4], vec![1.0; 3], vec![0.0; 2], vec![0.0; 2]);
        assert!(Recording::new(rates(100.0, 25.0), chans).is_err());
    }

    #[test]
    fn test_gravity_normalization_uses_raw_median() {
        // magnitudes 2, 2, 4 -> median 2
        let chans = channels(
            vec![0.0; 4],
            vec![2.0, 0.0, 0.0],
            vec![0.0, 2.0, 0.0],
            vec![0.0, 0.0, -4.0],
        );
        let recording = Recording::new(rates(100.0, 25.0), chans).unwrap();
        let normalized = recording.normalized_acceleration().unwrap();

        assert_abs_diff_eq!(normalized.gravity, 2.0);
        let samples = normalized.samples.values();
        assert_eq!(samples[0], AccelSample::new(1.0, 0.0, 0.0));
        assert_eq!(samples[2], AccelSample::new(0.0, 0.0, -2.0));
        assert_abs_diff_eq!(samples[2].sum(), -2.0);
    }

    #[test]
    fn test_zero_gravity_rejected() {
        let chans = channels(vec![0.0; 4], vec![0.0; 3], vec![0.0; 3], vec![0.0; 3]);
        let recording = Recording::new(rates(100.0, 25.0), chans).unwrap();
        assert!(matches!(
            recording.normalized_acceleration(),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_points_infers_rates() {
        let ecg: Vec<Point> = (0..5).map(|i| Point { time: i * 4_000_000, value: i as f64 }).collect();
        let axis: Vec<Point> = (0..3).map(|i| Point { time: i * 40_000_000, value: 1.0 }).collect();
        let recording = Recording::from_points(HashMap::from([
            (ChannelId::Ecg, ecg),
            (ChannelId::AccX, axis.clone()),
            (ChannelId::AccY, axis.clone()),
            (ChannelId::AccZ, axis),
        ]))
        .unwrap();

        assert_abs_diff_eq!(recording.sample_rates().rate(ChannelId::Ecg).unwrap(), 250.0);
        assert_abs_diff_eq!(recording.sample_rates().rate(ChannelId::AccZ).unwrap(), 25.0);
        assert_eq!(recording.end(), 16_000_000);
    }

    #[test]
    fn test_from_points_rejects_unordered_timestamps() {
        let bad = vec![Point { time: 10, value: 0.0 }, Point { time: 5, value: 0.0 }];
        let good = vec![Point { time: 0, value: 0.0 }, Point { time: 5, value: 0.0 }];
        let result = Recording::from_points(HashMap::from([
            (ChannelId::Ecg, bad),
            (ChannelId::AccX, good.clone()),
            (ChannelId::AccY, good.clone()),
            (ChannelId::AccZ, good),
        ]));
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_accel_mean_and_clip() {
        let mean = AccelSample::mean(&[AccelSample::new(1.0, 2.0, 3.0), AccelSample::new(3.0, 2.0, 1.0)]);
        assert_eq!(mean, Some(AccelSample::new(2.0, 2.0, 2.0)));
        assert_eq!(AccelSample::mean(&[]), None);
        assert_eq!(
            AccelSample::new(1.5, -0.2, -3.0).clipped(),
            AccelSample::new(1.0, -0.2, -1.0)
        );
    }
}
