//! Conversion between row types and Polars frames.
//!
//! Dates are stored as ISO `YYYY-MM-DD` strings; ids as strings; values as
//! nullable `f64`; sunrise/sunset as `i64`.

use air_quality_ingestor::models::{observation::Observation, weather::WeatherDay};
use chrono::NaiveDate;
use indexmap::IndexMap;
use polars::prelude::*;

use crate::{
    features::{
        chain::ForecastRow,
        lag::{LaggedObservation, TARGET_COLUMN, lag_column, parse_lag_column},
    },
    store::StoreError,
};

/// Record identity inside a group: event date, entity, optional qualifier.
///
/// Ordering by this key is the store's row order.
pub type RecordKey = (NaiveDate, String, Option<NaiveDate>);

/// A row type that can live in a feature group.
pub trait FeatureRecord: Sized + Clone {
    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError>;
    fn from_frame(df: &DataFrame) -> Result<Vec<Self>, StoreError>;
    fn entity_id(&self) -> &str;
    fn event_date(&self) -> NaiveDate;

    fn key(&self) -> RecordKey {
        (self.event_date(), self.entity_id().to_string(), None)
    }
}

const ID: &str = "id";
const DATE: &str = "date";
const SUNRISE: &str = "sunrise";
const SUNSET: &str = "sunset";
const PREDICTED: &str = "predicted_pm25";
const FORECAST_ON: &str = "forecast_on";

fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series, StoreError> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| StoreError::Schema(format!("missing column {name:?}")))
}

fn strings(df: &DataFrame, name: &str) -> Result<Vec<String>, StoreError> {
    series(df, name)?
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::to_string)
                .ok_or_else(|| StoreError::Schema(format!("null in column {name:?}")))
        })
        .collect()
}

fn dates(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>, StoreError> {
    strings(df, name)?
        .iter()
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| StoreError::Schema(format!("bad date {s:?} in {name:?}: {e}")))
        })
        .collect()
}

fn optional_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, StoreError> {
    Ok(series(df, name)?.f64()?.into_iter().collect())
}

fn required_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>, StoreError> {
    optional_f64(df, name)?
        .into_iter()
        .map(|v| v.ok_or_else(|| StoreError::Schema(format!("null in column {name:?}"))))
        .collect()
}

fn required_i64(df: &DataFrame, name: &str) -> Result<Vec<i64>, StoreError> {
    series(df, name)?
        .i64()?
        .into_iter()
        .map(|v| v.ok_or_else(|| StoreError::Schema(format!("null in column {name:?}"))))
        .collect()
}

fn id_column<R: FeatureRecord>(rows: &[R]) -> Column {
    Column::new(
        ID.into(),
        rows.iter().map(|r| r.entity_id().to_string()).collect::<Vec<_>>(),
    )
}

fn date_column(name: &str, values: impl Iterator<Item = NaiveDate>) -> Column {
    Column::new(name.into(), values.map(|d| d.to_string()).collect::<Vec<_>>())
}

/// Column names other than the given fixed ones, in frame order.
fn other_columns<'a>(df: &'a DataFrame, fixed: &[&str]) -> Vec<&'a str> {
    df.get_columns()
        .iter()
        .map(|c| c.name().as_str())
        .filter(|n| !fixed.contains(n))
        .collect()
}

/// The single name list every row must share.
fn uniform<'a, R, K: PartialEq + 'a>(
    rows: &'a [R],
    what: &str,
    names: impl Fn(&'a R) -> Vec<K>,
) -> Result<Vec<K>, StoreError> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let expected = names(first);
    if rows.iter().skip(1).any(|r| names(r) != expected) {
        return Err(StoreError::Schema(format!("rows disagree on {what}")));
    }
    Ok(expected)
}

impl FeatureRecord for Observation {
    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        Ok(DataFrame::new(vec![
            id_column(rows),
            date_column(DATE, rows.iter().map(|r| r.date)),
            Column::new(TARGET_COLUMN.into(), rows.iter().map(|r| r.value).collect::<Vec<_>>()),
        ])?)
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>, StoreError> {
        let ids = strings(df, ID)?;
        let dates = dates(df, DATE)?;
        let values = optional_f64(df, TARGET_COLUMN)?;
        Ok(ids
            .into_iter()
            .zip(dates)
            .zip(values)
            .map(|((id, date), value)| Observation::new(id, date, value))
            .collect())
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn event_date(&self) -> NaiveDate {
        self.date
    }
}

impl FeatureRecord for WeatherDay {
    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        let measures = uniform(rows, "weather variables", |r| {
            r.measures.keys().collect::<Vec<_>>()
        })?;

        let mut columns = vec![id_column(rows), date_column(DATE, rows.iter().map(|r| r.date))];
        for name in measures {
            let values: Vec<f64> = rows
                .iter()
                .map(|r| r.measures.get(name).copied().unwrap_or(f64::NAN))
                .collect();
            columns.push(Column::new(name.as_str().into(), values));
        }
        columns.push(Column::new(SUNRISE.into(), rows.iter().map(|r| r.sunrise).collect::<Vec<_>>()));
        columns.push(Column::new(SUNSET.into(), rows.iter().map(|r| r.sunset).collect::<Vec<_>>()));
        Ok(DataFrame::new(columns)?)
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>, StoreError> {
        let ids = strings(df, ID)?;
        let dates = dates(df, DATE)?;
        let sunrise = required_i64(df, SUNRISE)?;
        let sunset = required_i64(df, SUNSET)?;
        let names = other_columns(df, &[ID, DATE, SUNRISE, SUNSET]);
        let columns = names
            .iter()
            .map(|n| required_f64(df, n))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((0..df.height())
            .map(|i| WeatherDay {
                place_id: ids[i].clone(),
                date: dates[i],
                measures: names
                    .iter()
                    .zip(&columns)
                    .map(|(n, col)| (n.to_string(), col[i]))
                    .collect(),
                sunrise: sunrise[i],
                sunset: sunset[i],
            })
            .collect())
    }

    fn entity_id(&self) -> &str {
        &self.place_id
    }

    fn event_date(&self) -> NaiveDate {
        self.date
    }
}

impl FeatureRecord for LaggedObservation {
    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        let lags = uniform(rows, "lag columns", |r| {
            r.lags.keys().copied().collect::<Vec<_>>()
        })?;

        let mut columns = vec![
            id_column(rows),
            date_column(DATE, rows.iter().map(|r| r.date)),
            Column::new(TARGET_COLUMN.into(), rows.iter().map(|r| r.value).collect::<Vec<_>>()),
        ];
        for lag in lags {
            let values: Vec<Option<f64>> = rows.iter().map(|r| r.lag(lag)).collect();
            columns.push(Column::new(lag_column(TARGET_COLUMN, lag).as_str().into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>, StoreError> {
        let ids = strings(df, ID)?;
        let dates = dates(df, DATE)?;
        let values = optional_f64(df, TARGET_COLUMN)?;

        let mut lag_columns: Vec<(u32, Vec<Option<f64>>)> = Vec::new();
        for name in other_columns(df, &[ID, DATE, TARGET_COLUMN]) {
            let lag = parse_lag_column(TARGET_COLUMN, name)
                .ok_or_else(|| StoreError::Schema(format!("unexpected column {name:?}")))?;
            lag_columns.push((lag, optional_f64(df, name)?));
        }
        lag_columns.sort_by_key(|(lag, _)| *lag);

        Ok((0..df.height())
            .map(|i| LaggedObservation {
                entity_id: ids[i].clone(),
                date: dates[i],
                value: values[i],
                lags: lag_columns
                    .iter()
                    .map(|(lag, col)| (*lag, col[i]))
                    .collect::<IndexMap<_, _>>(),
            })
            .collect())
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn event_date(&self) -> NaiveDate {
        self.date
    }
}

impl FeatureRecord for ForecastRow {
    fn to_frame(rows: &[Self]) -> Result<DataFrame, StoreError> {
        Ok(DataFrame::new(vec![
            id_column(rows),
            date_column(DATE, rows.iter().map(|r| r.date)),
            Column::new(PREDICTED.into(), rows.iter().map(|r| r.predicted_pm25).collect::<Vec<_>>()),
            date_column(FORECAST_ON, rows.iter().map(|r| r.forecast_on)),
        ])?)
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>, StoreError> {
        let ids = strings(df, ID)?;
        let event_dates = dates(df, DATE)?;
        let predicted = required_f64(df, PREDICTED)?;
        let forecast_on = dates(df, FORECAST_ON)?;
        Ok((0..df.height())
            .map(|i| ForecastRow {
                entity_id: ids[i].clone(),
                date: event_dates[i],
                predicted_pm25: predicted[i],
                forecast_on: forecast_on[i],
            })
            .collect())
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn event_date(&self) -> NaiveDate {
        self.date
    }

    /// Forecasts for the same date made on different days coexist.
    fn key(&self) -> RecordKey {
        (self.date, self.entity_id.clone(), Some(self.forecast_on))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, n).unwrap()
    }

    #[test]
    fn observation_frame_keeps_missing_values() {
        let rows = vec![
            Observation::new("@1", d(1), Some(4.0)),
            Observation::new("@1", d(2), None),
        ];
        let df = Observation::to_frame(&rows).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(Observation::from_frame(&df).unwrap(), rows);
    }

    #[test]
    fn lagged_columns_are_named_and_recovered() {
        let row = LaggedObservation {
            entity_id: "@1".into(),
            date: d(4),
            value: Some(3.0),
            lags: [(1, Some(2.0)), (2, None)].into_iter().collect(),
        };
        let df = LaggedObservation::to_frame(std::slice::from_ref(&row)).unwrap();
        let names: Vec<_> = df.get_columns().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["id", "date", "pm25", "pm25_lagged_1d", "pm25_lagged_2d"]);
        assert_eq!(LaggedObservation::from_frame(&df).unwrap(), vec![row]);
    }

    #[test]
    fn weather_rows_must_share_variables() {
        let mk = |vars: &[&str]| WeatherDay {
            place_id: "@1".into(),
            date: d(1),
            measures: vars.iter().map(|v| (v.to_string(), 1.0)).collect(),
            sunrise: 1,
            sunset: 2,
        };
        assert!(WeatherDay::to_frame(&[mk(&["a", "b"]), mk(&["a", "b"])]).is_ok());
        assert!(matches!(
            WeatherDay::to_frame(&[mk(&["a", "b"]), mk(&["b", "a"])]),
            Err(StoreError::Schema(_))
        ));
    }

    #[test]
    fn forecast_key_includes_forecast_day() {
        let a = ForecastRow {
            entity_id: "@1".into(),
            date: d(10),
            predicted_pm25: 1.0,
            forecast_on: d(1),
        };
        let b = ForecastRow {
            forecast_on: d(2),
            ..a.clone()
        };
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn forecast_frame_keeps_both_dates() {
        let rows = vec![ForecastRow {
            entity_id: "@1".into(),
            date: d(10),
            predicted_pm25: 12.5,
            forecast_on: d(8),
        }];
        let df = ForecastRow::to_frame(&rows).unwrap();
        let back = ForecastRow::from_frame(&df).unwrap();
        assert_eq!(back[0].date, d(10));
        assert_eq!(back[0].forecast_on, d(8));
        assert_eq!(back[0].predicted_pm25, 12.5);
    }
}
