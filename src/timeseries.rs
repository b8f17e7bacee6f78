//! # Time Series Module
//!
//! Evenly sampled series and the resampling helpers the estimators share.
//!
//! ## Key Types
//! - `Point`: a raw (timestamp, value) sample as delivered by ingestion
//! - `TimeSeries<T>`: start time + sample rate + values, timestamps implied
//! - `Estimate`: one windowed estimate stamped with its window end time
//!
//! ## Timestamps
//! All timestamps are nanoseconds since the Unix epoch. Sample `n` of a
//! series lives at `start + round(n * 1e9 / sample_rate)`.
//!
//! ## Buckets
//! Time-bucket resampling aligns buckets to multiples of the bucket length
//! since the epoch, so two series resampled to the same bucket length share
//! their grid and can be joined by exact timestamp.

pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub time: u64,
    pub value: f64,
}

pub trait PointSliceExt {
    fn min_max_time(&self) -> Option<(u64, u64)>;
    fn is_strictly_increasing(&self) -> bool;
    fn inferred_sample_rate(&self) -> Option<f64>;
}

impl PointSliceExt for &[Point] {
    fn min_max_time(&self) -> Option<(u64, u64)> {
        self.iter().fold(None, |acc, point| match acc {
            None => Some((point.time, point.time)),
            Some((min, max)) => Some((min.min(point.time), max.max(point.time))),
        })
    }

    fn is_strictly_increasing(&self) -> bool {
        self.windows(2).all(|pair| pair[0].time < pair[1].time)
    }

    /// Rate implied by the first and last timestamps, assuming even spacing
    fn inferred_sample_rate(&self) -> Option<f64> {
        let (first, last) = self.min_max_time()?;
        if self.len() < 2 || last == first {
            return None;
        }
        Some((self.len() - 1) as f64 * NANOS_PER_SECOND as f64 / (last - first) as f64)
    }
}

/// Evenly sampled series
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<T> {
    start: u64,
    sample_rate: f64,
    values: Vec<T>,
}

impl<T> TimeSeries<T> {
    pub fn new(start: u64, sample_rate: f64, values: Vec<T>) -> Self {
        Self {
            start,
            sample_rate,
            values,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Timestamp of sample `index` (may lie past the end of the series)
    pub fn time_at(&self, index: usize) -> u64 {
        self.start + (index as f64 * NANOS_PER_SECOND as f64 / self.sample_rate).round() as u64
    }

    pub fn end_time(&self) -> Option<u64> {
        self.values.len().checked_sub(1).map(|last| self.time_at(last))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &T)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, value)| (self.time_at(i), value))
    }

    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> TimeSeries<U> {
        TimeSeries {
            start: self.start,
            sample_rate: self.sample_rate,
            values: self.values.iter().map(f).collect(),
        }
    }

    /// Value stamped exactly at `time`, if the series has a sample there
    pub fn value_at(&self, time: u64) -> Option<&T> {
        if time < self.start {
            return None;
        }
        let offset = (time - self.start) as f64 * self.sample_rate / NANOS_PER_SECOND as f64;
        let index = offset.round() as usize;
        if index < self.values.len() && self.time_at(index) == time {
            self.values.get(index)
        } else {
            None
        }
    }

    /// Averages samples into buckets of `bucket_ns` nanoseconds.
    ///
    /// The result covers every bucket from the one holding the first sample to
    /// the one holding the last; buckets without samples are `None`.
    pub fn resample_with<U>(
        &self,
        bucket_ns: u64,
        reduce: impl Fn(&[T]) -> U,
    ) -> TimeSeries<Option<U>> {
        let out_rate = NANOS_PER_SECOND as f64 / bucket_ns as f64;
        let Some(end) = self.end_time() else {
            return TimeSeries::new(self.start, out_rate, Vec::new());
        };

        let first_bucket = self.start / bucket_ns;
        let bucket_count = (end / bucket_ns - first_bucket) as usize + 1;
        let mut out: Vec<Option<U>> = Vec::with_capacity(bucket_count);

        // Timestamps are increasing, so every bucket is one contiguous run
        let mut run_start = 0;
        while run_start < self.values.len() {
            let bucket = self.time_at(run_start) / bucket_ns;
            let mut run_end = run_start + 1;
            while run_end < self.values.len() && self.time_at(run_end) / bucket_ns == bucket {
                run_end += 1;
            }

            let slot = (bucket - first_bucket) as usize;
            while out.len() < slot {
                out.push(None);
            }
            out.push(Some(reduce(&self.values[run_start..run_end])));
            run_start = run_end;
        }

        TimeSeries::new(first_bucket * bucket_ns, out_rate, out)
    }
}

impl TimeSeries<f64> {
    /// Mean of the samples in each bucket
    pub fn resample_mean(&self, bucket_ns: u64) -> TimeSeries<Option<f64>> {
        self.resample_with(bucket_ns, |bucket| {
            bucket.iter().sum::<f64>() / bucket.len() as f64
        })
    }
}

impl<T: Clone> TimeSeries<Option<T>> {
    /// Replaces gaps with the previous value.
    ///
    /// Leading gaps have nothing to hold and are dropped, moving the start
    /// forward. Returns the filled series and the number of gaps filled.
    pub fn hold_gaps(&self) -> (TimeSeries<T>, usize) {
        let Some(first) = self.values.iter().position(Option::is_some) else {
            return (TimeSeries::new(self.start, self.sample_rate, Vec::new()), 0);
        };

        let mut filled = 0;
        let mut values: Vec<T> = Vec::with_capacity(self.values.len() - first);
        for value in &self.values[first..] {
            match value {
                Some(v) => values.push(v.clone()),
                None => {
                    // first slot is Some, so there is always a previous value
                    if let Some(previous) = values.last().cloned() {
                        values.push(previous);
                        filled += 1;
                    }
                }
            }
        }

        (
            TimeSeries::new(self.time_at(first), self.sample_rate, values),
            filled,
        )
    }
}

/// One windowed estimate, stamped with the end of its window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub time: u64,
    pub value: Option<f64>,
}

/// Holds sparse estimates constant onto a regular grid of `period_ns`.
///
/// Grid points run from the bucket of the first estimate to the bucket of
/// the last one. Each grid point takes the latest estimate at or before it;
/// a grid point earlier than every estimate stays `None`.
pub fn pad_forward(estimates: &[Estimate], period_ns: u64) -> TimeSeries<Option<f64>> {
    let rate = NANOS_PER_SECOND as f64 / period_ns as f64;
    let (Some(first), Some(last)) = (estimates.first(), estimates.last()) else {
        return TimeSeries::new(0, rate, Vec::new());
    };

    let grid_start = first.time / period_ns * period_ns;
    let grid_end = last.time / period_ns * period_ns;

    let mut values = Vec::with_capacity(((grid_end - grid_start) / period_ns) as usize + 1);
    let mut next = 0;
    let mut current: Option<f64> = None;
    let mut t = grid_start;
    while t <= grid_end {
        while next < estimates.len() && estimates[next].time <= t {
            current = estimates[next].value;
            next += 1;
        }
        values.push(if next == 0 { None } else { current });
        t += period_ns;
    }

    TimeSeries::new(grid_start, rate, values)
}

/// Median with the even-length convention of averaging the two middle values
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Percentile `q` (0..=100) with linear interpolation between order statistics
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = rank - lower as f64;
    Some(sorted[lower] + fraction * (sorted[upper] - sorted[lower]))
}
