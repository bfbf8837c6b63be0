//! Per-sensor CSV exports from aqicn.org.
//!
//! One file per sensor, named `<sensor id>.csv`. Headers and values come
//! padded with spaces (`date, pm25, pm10, ...`), dates as `YYYY/M/D`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use indexmap::IndexMap;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::{
    errors::IngestError,
    models::{
        observation::Observation,
        sensor::{PM25_FIELD, SensorId},
    },
};

const DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// All `*.csv` files in `dir`, sorted by name.
pub fn list_history_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, IngestError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(IngestError::MissingInput(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| IngestError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Sensor id encoded in a history file name.
pub fn sensor_from_path(path: &Path) -> Result<SensorId, IngestError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| IngestError::Malformed {
            path: path.display().to_string(),
            message: "file name is not a sensor id".to_string(),
        })?;
    SensorId::parse(stem)
}

/// Read one sensor's export into PM2.5 observations, sorted by date.
///
/// The file must exist. Rows without a date or without a PM2.5 value are
/// skipped; any other unparseable value is an error, and so is a PM2.5
/// value outside the accepted range.
pub fn read_history_file(path: impl AsRef<Path>) -> Result<Vec<Observation>, IngestError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(IngestError::MissingInput(path.to_path_buf()));
    }
    let sensor = sensor_from_path(path)?;
    let malformed = |message: String| IngestError::Malformed {
        path: path.display().to_string(),
        message,
    };

    // Schema inference off: every column is read as a string and parsed here.
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let columns: IndexMap<String, &Column> = df
        .get_columns()
        .iter()
        .map(|c| (c.name().trim().to_string(), c))
        .collect();
    let columns = sensor.route_fields(columns);

    let date_col = columns
        .get("date")
        .ok_or_else(|| malformed("no date column".to_string()))?
        .as_materialized_series()
        .str()?;
    let value_col = columns
        .get(PM25_FIELD)
        .ok_or_else(|| malformed(format!("no {} column", sensor.value_field())))?
        .as_materialized_series()
        .str()?;

    let mut observations = Vec::with_capacity(df.height());
    let mut skipped = 0usize;
    for (row, (date, value)) in date_col.into_iter().zip(value_col.into_iter()).enumerate() {
        let date = date.map(str::trim).filter(|s| !s.is_empty());
        let value = value.map(str::trim).filter(|s| !s.is_empty());
        let (Some(date), Some(value)) = (date, value) else {
            skipped += 1;
            continue;
        };

        let date = parse_date(date)
            .ok_or_else(|| malformed(format!("row {}: bad date {date:?}", row + 1)))?;
        let value: f64 = value
            .parse()
            .map_err(|_| malformed(format!("row {}: bad pm25 {value:?}", row + 1)))?;
        let observation = Observation::new(sensor.as_str(), date, Some(value));
        observation.check_range()?;
        observations.push(observation);
    }

    if skipped > 0 {
        warn!(sensor = %sensor, skipped, "skipped history rows with missing values");
    }
    observations.sort_by_key(|o| o.date);
    debug!(sensor = %sensor, rows = observations.len(), "history file read");
    Ok(observations)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_date_styles() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5);
        assert_eq!(parse_date("2024/1/5"), expected);
        assert_eq!(parse_date("2024-01-05"), expected);
        assert_eq!(parse_date("05.01.2024"), None);
    }

    #[test]
    fn sensor_id_comes_from_file_stem() {
        let id = sensor_from_path(Path::new("/data/@13986.csv")).unwrap();
        assert_eq!(id.as_str(), "@13986");
        assert!(sensor_from_path(Path::new("/data/notes.csv")).is_err());
    }
}
