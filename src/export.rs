//! # Result Export Module
//!
//! Writes an [`OutputTable`] next to its recording.
//!
//! ## CSV
//! ```text
//! time,RR,HR,Pos_Index,Position,Tilt,Rotation
//! 2020-09-13T12:26:55.000Z,,75,0,SUPINE,1.2,0
//! ```
//! `time` is RFC 3339 UTC with milliseconds. Missing estimates are empty
//! fields.
//!
//! ## HDF5 (feature `hdf5`)
//! Group `results` with `times` (u64 ns), `rr`, `hr`, `tilt`, `rotation`
//! (f64, NaN where missing) and `pos_index` (i32), plus a `metadata` group
//! carrying the first row's time as `start_time_ns`.

use crate::config::OutputFormat;
use crate::error::RecordingError;
use crate::pipeline::OutputTable;
use chrono::{SecondsFormat, TimeZone, Utc};
use std::path::{Path, PathBuf};

pub const CSV_HEADER: [&str; 7] = ["time", "RR", "HR", "Pos_Index", "Position", "Tilt", "Rotation"];

/// Result file for `input`: its stem plus `suffix`, in `output_dir` when
/// given, else beside the input
pub fn output_path(
    input: &Path,
    output_dir: Option<&Path>,
    suffix: &str,
    format: OutputFormat,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let file_name = format!("{}{}.{}", stem, suffix, format.extension());

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => input
            .parent()
            .map(|parent| parent.join(&file_name))
            .unwrap_or_else(|| PathBuf::from(&file_name)),
    }
}

/// Nanoseconds since epoch as RFC 3339 UTC, millisecond precision
pub fn format_time(time_ns: u64) -> String {
    Utc.timestamp_nanos(time_ns as i64)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_results(
    path: &Path,
    table: &OutputTable,
    format: OutputFormat,
) -> Result<(), RecordingError> {
    match format {
        OutputFormat::Csv => write_csv(path, table),
        #[cfg(feature = "hdf5")]
        OutputFormat::Hdf5 => write_hdf5(path, table),
        #[cfg(not(feature = "hdf5"))]
        OutputFormat::Hdf5 => Err(RecordingError::UnknownFormat(
            "hdf5 output (built without HDF5 support)".to_string(),
        )),
    }
}

pub fn write_csv(path: &Path, table: &OutputTable) -> Result<(), RecordingError> {
    let mut writer = csv::Writer::from_path(path)?;
    write_csv_to(&mut writer, table)?;
    writer.flush()?;
    Ok(())
}

fn write_csv_to<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    table: &OutputTable,
) -> Result<(), RecordingError> {
    writer.write_record(CSV_HEADER)?;
    for row in table.rows() {
        writer.write_record([
            format_time(row.time),
            format_value(row.rr),
            format_value(row.hr),
            row.position.index().to_string(),
            row.position.label().to_string(),
            format_value(row.tilt),
            format_value(row.rotation),
        ])?;
    }
    Ok(())
}

#[cfg(feature = "hdf5")]
pub fn write_hdf5(path: &Path, table: &OutputTable) -> Result<(), RecordingError> {
    use hdf5::{File, Group, H5Type};

    fn write_dataset<T: H5Type>(group: &Group, name: &str, values: &[T]) -> Result<(), RecordingError> {
        group
            .new_dataset::<T>()
            .shape(values.len())
            .create(name)
            .and_then(|dataset| dataset.write(values))
            .map_err(|e| RecordingError::Hdf5(format!("Failed to write dataset {}: {}", name, e)))
    }

    let rows = table.rows();
    let nan = |value: Option<f64>| value.unwrap_or(f64::NAN);

    let file = File::create(path)
        .map_err(|e| RecordingError::Hdf5(format!("Failed to create HDF5 file: {}", e)))?;
    let group = file
        .create_group("results")
        .map_err(|e| RecordingError::Hdf5(format!("Failed to create results group: {}", e)))?;

    let times: Vec<u64> = rows.iter().map(|row| row.time).collect();
    write_dataset(&group, "times", &times)?;
    write_dataset(&group, "rr", &rows.iter().map(|row| nan(row.rr)).collect::<Vec<_>>())?;
    write_dataset(&group, "hr", &rows.iter().map(|row| nan(row.hr)).collect::<Vec<_>>())?;
    write_dataset(
        &group,
        "pos_index",
        &rows.iter().map(|row| row.position.index() as i32).collect::<Vec<_>>(),
    )?;
    write_dataset(&group, "tilt", &rows.iter().map(|row| nan(row.tilt)).collect::<Vec<_>>())?;
    write_dataset(
        &group,
        "rotation",
        &rows.iter().map(|row| nan(row.rotation)).collect::<Vec<_>>(),
    )?;

    let start_time = times.first().copied().unwrap_or(0);
    let metadata = file
        .create_group("metadata")
        .map_err(|e| RecordingError::Hdf5(format!("Failed to create metadata group: {}", e)))?;
    metadata
        .new_attr::<u64>()
        .create("start_time_ns")
        .map_err(|e| RecordingError::Hdf5(format!("Failed to create start_time attribute: {}", e)))?
        .write_scalar(&start_time)
        .map_err(|e| RecordingError::Hdf5(format!("Failed to write start_time: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::OutputRow;
    use crate::position::BodyPosition;
    use crate::timeseries::NANOS_PER_SECOND;
    use std::fs;
    use tempfile::tempdir;

    const START: u64 = 1_600_000_000 * NANOS_PER_SECOND;

    fn table() -> OutputTable {
        OutputTable::from(vec![
            OutputRow {
                time: START,
                rr: None,
                hr: Some(75.0),
                position: BodyPosition::Supine,
                tilt: Some(1.5),
                rotation: Some(0.0),
            },
            OutputRow {
                time: START + NANOS_PER_SECOND,
                rr: Some(12.0),
                hr: None,
                position: BodyPosition::LeftSide,
                tilt: None,
                rotation: Some(-64.25),
            },
        ])
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(START), "2020-09-13T12:26:40.000Z");
        assert_eq!(format_time(START + 1_234_567_890), "2020-09-13T12:26:41.234Z");
    }

    #[test]
    fn test_csv_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec_results.csv");
        write_results(&path, &table(), OutputFormat::Csv).unwrap();
        let text = fs::read_to_string(&path).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time,RR,HR,Pos_Index,Position,Tilt,Rotation");
        assert_eq!(lines[1], "2020-09-13T12:26:40.000Z,,75,0,SUPINE,1.5,0");
        assert_eq!(lines[2], "2020-09-13T12:26:41.000Z,12,,4,LEFT_SIDE,,-64.25");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty_results.csv");
        write_results(&path, &OutputTable::default(), OutputFormat::Csv).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), "time,RR,HR,Pos_Index,Position,Tilt,Rotation");
    }

    #[test]
    fn test_output_path() {
        let input = Path::new("/data/night1/subject7.csv");
        assert_eq!(
            output_path(input, None, "_results", OutputFormat::Csv),
            PathBuf::from("/data/night1/subject7_results.csv")
        );
        assert_eq!(
            output_path(input, Some(Path::new("/out")), "_hr", OutputFormat::Hdf5),
            PathBuf::from("/out/subject7_hr.h5")
        );
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_hdf5_output_needs_feature() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.h5");
        assert!(matches!(
            write_results(&path, &table(), OutputFormat::Hdf5),
            Err(RecordingError::UnknownFormat(_))
        ));
    }

    #[cfg(feature = "hdf5")]
    #[test]
    fn test_hdf5_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.h5");
        write_results(&path, &table(), OutputFormat::Hdf5).unwrap();

        let file = hdf5::File::open(&path).unwrap();
        let group = file.group("results").unwrap();
        let times: Vec<u64> = group.dataset("times").unwrap().read_raw().unwrap();
        let rr: Vec<f64> = group.dataset("rr").unwrap().read_raw().unwrap();
        let pos: Vec<i32> = group.dataset("pos_index").unwrap().read_raw().unwrap();
        assert_eq!(times, vec![START, START + NANOS_PER_SECOND]);
        assert!(rr[0].is_nan());
        assert_eq!(rr[1], 12.0);
        assert_eq!(pos, vec![0, 4]);
    }
}
