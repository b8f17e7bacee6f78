//! # Recording Ingestion Module
//!
//! Reads a recording file into a [`Recording`].
//!
//! ## CSV
//! Long format, one sample per line, channels in any interleaving:
//! ```text
//! channel,time_ns,value
//! ECG,1600000000000000000,-112
//! Accelerometer_X,1600000000000000000,12
//! ```
//! Channel labels may also be written as `ecg`, `acc_x`, `acc_y`, `acc_z`.
//!
//! ## HDF5 (feature `hdf5`)
//! One group per channel (`ecg`, `acc_x`, `acc_y`, `acc_z`), each holding a
//! `times` dataset (u64 ns) and a `values` dataset (i32), the layout the
//! recorder application writes.
//!
//! Either way each channel's sample rate is inferred from its timestamps.

use crate::error::RecordingError;
use crate::recording::{ChannelId, Recording};
use crate::timeseries::Point;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Recording file formats this build can read
pub fn is_supported(path: &Path) -> bool {
    match extension(path).as_deref() {
        Some("csv") => true,
        Some("h5") | Some("hdf5") => cfg!(feature = "hdf5"),
        _ => false,
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Read a recording, choosing the reader from the file extension
pub fn read_recording(path: &Path) -> Result<Recording, RecordingError> {
    match extension(path).as_deref() {
        Some("csv") => read_csv(path),
        #[cfg(feature = "hdf5")]
        Some("h5") | Some("hdf5") => read_hdf5(path),
        #[cfg(not(feature = "hdf5"))]
        Some("h5") | Some("hdf5") => Err(RecordingError::UnknownFormat(format!(
            "{} (built without HDF5 support)",
            path.display()
        ))),
        _ => Err(RecordingError::UnknownFormat(path.display().to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct CsvSample {
    channel: String,
    time_ns: u64,
    value: f64,
}

/// Read a long-format CSV recording
pub fn read_csv(path: &Path) -> Result<Recording, RecordingError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    read_csv_from(&mut reader)
}

fn read_csv_from<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
) -> Result<Recording, RecordingError> {
    let headers = reader.headers()?.clone();
    let mut channels: HashMap<ChannelId, Vec<Point>> = HashMap::new();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|pos| pos.line());
        let sample: CsvSample =
            record
                .deserialize(Some(&headers))
                .map_err(|e| RecordingError::Malformed {
                    line,
                    reason: e.to_string(),
                })?;

        let channel = ChannelId::parse(&sample.channel).ok_or_else(|| RecordingError::Malformed {
            line,
            reason: format!("unknown channel '{}'", sample.channel),
        })?;
        if !sample.value.is_finite() {
            return Err(RecordingError::Malformed {
                line,
                reason: format!("non-finite value on channel {}", channel.label()),
            });
        }

        channels.entry(channel).or_default().push(Point {
            time: sample.time_ns,
            value: sample.value,
        });
    }

    for (channel, points) in &channels {
        log::debug!("{}: {} samples", channel.label(), points.len());
    }

    Ok(Recording::from_points(channels)?)
}

/// Read an HDF5 recording in the recorder's group layout
#[cfg(feature = "hdf5")]
pub fn read_hdf5(path: &Path) -> Result<Recording, RecordingError> {
    use hdf5::File;

    let hdf5_err = |what: &str, e: hdf5::Error| RecordingError::Hdf5(format!("{}: {}", what, e));

    let file = File::open(path).map_err(|e| hdf5_err("Failed to open file", e))?;
    let mut channels = HashMap::new();

    for channel in ChannelId::all() {
        let group_name = channel.group_name();
        let group = match file.group(group_name) {
            Ok(group) => group,
            Err(_) => {
                // left to Recording::from_points to report as a missing channel
                log::debug!("No group {} in {}", group_name, path.display());
                continue;
            }
        };

        let times: Vec<u64> = group
            .dataset("times")
            .and_then(|ds| ds.read_raw())
            .map_err(|e| hdf5_err(&format!("Failed to read {}/times", group_name), e))?;
        let values: Vec<i32> = group
            .dataset("values")
            .and_then(|ds| ds.read_raw())
            .map_err(|e| hdf5_err(&format!("Failed to read {}/values", group_name), e))?;

        if times.len() != values.len() {
            return Err(RecordingError::Malformed {
                line: None,
                reason: format!(
                    "group {} has {} times but {} values",
                    group_name,
                    times.len(),
                    values.len()
                ),
            });
        }

        let points: Vec<Point> = times
            .into_iter()
            .zip(values)
            .map(|(time, value)| Point {
                time,
                value: value as f64,
            })
            .collect();
        channels.insert(channel, points);
    }

    Ok(Recording::from_points(channels)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::timeseries::NANOS_PER_SECOND;
    use approx::assert_abs_diff_eq;
    use std::fmt::Write as _;
    use std::fs;
    use tempfile::tempdir;

    const START: u64 = 1_600_000_000 * NANOS_PER_SECOND;

    /// Interleaved CSV: ECG at 130 Hz for 2 s, accelerometer at 25 Hz
    fn recording_csv(labels: [&str; 4]) -> String {
        let mut csv = String::from("channel,time_ns,value\n");
        for i in 0..260u64 {
            writeln!(csv, "{},{},{}", labels[0], START + i * NANOS_PER_SECOND / 130, i % 7).unwrap();
            if i < 50 {
                let t = START + i * NANOS_PER_SECOND / 25;
                writeln!(csv, "{},{},10", labels[1], t).unwrap();
                writeln!(csv, "{},{},-20", labels[2], t).unwrap();
                writeln!(csv, "{},{},-990", labels[3], t).unwrap();
            }
        }
        csv
    }

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_read_csv_infers_rates() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "rec.csv",
            &recording_csv(["ECG", "Accelerometer_X", "Accelerometer_Y", "Accelerometer_Z"]),
        );

        let recording = read_recording(&path).unwrap();
        assert_eq!(recording.start(), START);
        assert_eq!(recording.ecg().unwrap().len(), 260);
        assert_abs_diff_eq!(recording.sample_rates().get("ECG").unwrap(), 130.0, epsilon = 1e-3);
        assert_abs_diff_eq!(
            recording.sample_rates().rate(ChannelId::AccZ).unwrap(),
            25.0,
            epsilon = 1e-6
        );

        let raw = recording.raw_acceleration().unwrap();
        assert_eq!(raw.len(), 50);
        assert_eq!(raw.values()[0].z, -990.0);
    }

    #[test]
    fn test_read_csv_accepts_group_names() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "rec.CSV", &recording_csv(["ecg", "acc_x", "ACC_Y", "acc_z"]));
        assert!(is_supported(&path));
        assert!(read_recording(&path).is_ok());
    }

    #[test]
    fn test_unknown_channel_reports_line() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "rec.csv", "channel,time_ns,value\nECG,1,0\nPPG,2,0\n");
        match read_recording(&path) {
            Err(RecordingError::Malformed { line, reason }) => {
                assert_eq!(line, Some(3));
                assert!(reason.contains("PPG"));
            }
            other => panic!("expected malformed error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_value_is_malformed() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "rec.csv", "channel,time_ns,value\nECG,1,abc\n");
        assert!(matches!(
            read_recording(&path),
            Err(RecordingError::Malformed { line: Some(2), .. })
        ));
    }

    #[test]
    fn test_missing_channel_is_invalid_input() {
        let dir = tempdir().unwrap();
        let mut csv = String::from("channel,time_ns,value\n");
        for i in 0..10u64 {
            writeln!(csv, "ECG,{},0", START + i * 1_000_000).unwrap();
        }
        let path = write(dir.path(), "rec.csv", &csv);
        assert!(matches!(
            read_recording(&path),
            Err(RecordingError::Pipeline(PipelineError::InvalidInput(_)))
        ));
    }

    #[test]
    fn test_non_increasing_timestamps_rejected() {
        let dir = tempdir().unwrap();
        let mut csv = recording_csv(["ECG", "acc_x", "acc_y", "acc_z"]);
        writeln!(csv, "ECG,{},0", START).unwrap();
        let path = write(dir.path(), "rec.csv", &csv);
        assert!(matches!(
            read_recording(&path),
            Err(RecordingError::Pipeline(PipelineError::InvalidInput(_)))
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "rec.txt", "");
        assert!(!is_supported(&path));
        assert!(matches!(
            read_recording(&path),
            Err(RecordingError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_is_csv_error() {
        let dir = tempdir().unwrap();
        let result = read_recording(&dir.path().join("absent.csv"));
        // csv wraps the open failure in its own error type
        assert!(matches!(result, Err(RecordingError::Csv(_))));
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn test_read_hdf5_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec.h5");
        {
            let file = hdf5::File::create(&path).unwrap();
            for (channel, rate, n) in [
                (ChannelId::Ecg, 130u64, 260u64),
                (ChannelId::AccX, 25, 50),
                (ChannelId::AccY, 25, 50),
                (ChannelId::AccZ, 25, 50),
            ] {
                let group = file.create_group(channel.group_name()).unwrap();
                let times: Vec<u64> = (0..n).map(|i| START + i * NANOS_PER_SECOND / rate).collect();
                let values: Vec<i32> = (0..n).map(|i| i as i32).collect();
                group
                    .new_dataset::<u64>()
                    .shape(times.len())
                    .create("times")
                    .unwrap()
                    .write(&times)
                    .unwrap();
                group
                    .new_dataset::<i32>()
                    .shape(values.len())
                    .create("values")
                    .unwrap()
                    .write(&values)
                    .unwrap();
            }
        }

        let recording = read_recording(&path).unwrap();
        assert_eq!(recording.start(), START);
        assert_eq!(recording.ecg().unwrap().values()[5], 5.0);
        assert_abs_diff_eq!(recording.sample_rates().get("Accelerometer_X").unwrap(), 25.0, epsilon = 1e-6);
    }
}
