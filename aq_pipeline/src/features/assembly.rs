//! Training sets and inference batches built from stored feature groups.
//!
//! A model's feature vector is the weather variables of the day (measures in
//! stored order, then sunrise and sunset) followed by the lag values in lag
//! order. Names are prefixed by the group they come from.

use air_quality_ingestor::models::weather::{TIMESTAMP_VARIABLES, WeatherDay, measure_variables};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    features::{
        chain::ForecastInput,
        lag::{LagSet, LaggedObservation, TARGET_COLUMN, lag_column},
    },
    store::join::{join_asof_before, join_exact},
};

pub const WEATHER_PREFIX: &str = "weather_";
pub const LAGGED_PREFIX: &str = "lagged_aq_";

#[derive(Debug, Error, PartialEq)]
pub enum AssemblyError {
    #[error("{entity} on {date}: weather variable {variable} is missing")]
    MissingWeather {
        entity: String,
        date: NaiveDate,
        variable: String,
    },

    #[error("feature names do not match lag set {lags:?}: {names:?}")]
    LayoutMismatch { names: Vec<String>, lags: Vec<u32> },
}

/// Ordered feature columns of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLayout {
    pub weather: Vec<String>,
    pub lags: LagSet,
}

impl FeatureLayout {
    /// The fixed daily variable list with the given lags.
    pub fn standard(lags: LagSet) -> Self {
        let weather = measure_variables()
            .into_iter()
            .chain(TIMESTAMP_VARIABLES)
            .map(str::to_string)
            .collect();
        Self { weather, lags }
    }

    /// Rebuild a layout from the feature names recorded with a model.
    pub fn from_feature_names(names: &[String], lags: LagSet) -> Result<Self, AssemblyError> {
        let weather: Vec<String> = names
            .iter()
            .filter_map(|n| n.strip_prefix(WEATHER_PREFIX))
            .map(str::to_string)
            .collect();
        let layout = Self { weather, lags };
        if layout.feature_names() != names {
            return Err(AssemblyError::LayoutMismatch {
                names: names.to_vec(),
                lags: layout.lags.as_slice().to_vec(),
            });
        }
        Ok(layout)
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.weather
            .iter()
            .map(|w| format!("{WEATHER_PREFIX}{w}"))
            .chain(
                self.lags
                    .as_slice()
                    .iter()
                    .map(|&n| format!("{LAGGED_PREFIX}{}", lag_column(TARGET_COLUMN, n))),
            )
            .collect()
    }

    pub fn width(&self) -> usize {
        self.weather.len() + self.lags.len()
    }

    /// Weather part of the feature vector for one day.
    pub fn weather_vector(&self, day: &WeatherDay) -> Result<Vec<f64>, AssemblyError> {
        self.weather
            .iter()
            .map(|name| {
                let value = match name.as_str() {
                    "sunrise" => Some(day.sunrise as f64),
                    "sunset" => Some(day.sunset as f64),
                    other => day.measure(other),
                };
                value.ok_or_else(|| AssemblyError::MissingWeather {
                    entity: day.place_id.clone(),
                    date: day.date,
                    variable: name.clone(),
                })
            })
            .collect()
    }
}

/// One supervised example.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub entity_id: String,
    pub date: NaiveDate,
    pub features: Vec<f64>,
    pub target: f64,
}

/// Lagged rows joined exactly to weather on `(id, date)`.
///
/// Rows lacking the target or any lag are dropped. The result follows the
/// order of `lagged`.
pub fn training_rows(
    lagged: &[LaggedObservation],
    weather: &[WeatherDay],
    layout: &FeatureLayout,
) -> Result<Vec<TrainingRow>, AssemblyError> {
    let mut rows = Vec::new();
    let mut incomplete = 0usize;

    for (obs, day) in join_exact(lagged, weather) {
        let Some(target) = obs.value else {
            incomplete += 1;
            continue;
        };
        let Some(lags) = layout
            .lags
            .as_slice()
            .iter()
            .map(|&n| obs.lag(n))
            .collect::<Option<Vec<f64>>>()
        else {
            incomplete += 1;
            continue;
        };

        let mut features = layout.weather_vector(day)?;
        features.extend(lags);
        rows.push(TrainingRow {
            entity_id: obs.entity_id.clone(),
            date: obs.date,
            features,
            target,
        });
    }

    debug!(rows = rows.len(), incomplete, "training rows assembled");
    Ok(rows)
}

/// Split at `test_start`: dates before it train, the rest test.
pub fn split_chronological(
    rows: Vec<TrainingRow>,
    test_start: NaiveDate,
) -> (Vec<TrainingRow>, Vec<TrainingRow>) {
    rows.into_iter().partition(|r| r.date < test_start)
}

/// Forecast inputs for every weather row dated `start` or later.
///
/// Each row is seeded from the entity's latest lagged row strictly before
/// its date, shifted by one day: lag 1 takes that row's value and lag N
/// takes its lag N-1. Chaining later overwrites the seeds of every day
/// after the first. Entities without earlier history are skipped.
pub fn inference_batch(
    weather: &[WeatherDay],
    lagged: &[LaggedObservation],
    layout: &FeatureLayout,
    start: NaiveDate,
) -> Result<Vec<ForecastInput>, AssemblyError> {
    let upcoming: Vec<WeatherDay> = weather.iter().filter(|w| w.date >= start).cloned().collect();
    // Only measured rows can seed a lag window.
    let measured: Vec<LaggedObservation> = lagged.iter().filter(|r| r.value.is_some()).cloned().collect();

    let mut batch = Vec::with_capacity(upcoming.len());
    for (day, seed) in join_asof_before(&upcoming, &measured) {
        let Some(seed) = seed else {
            warn!(entity = %day.place_id, date = %day.date, "no air-quality history before date, skipped");
            continue;
        };
        let lags = layout
            .lags
            .as_slice()
            .iter()
            .map(|&n| if n == 1 { seed.value } else { seed.lag(n - 1) })
            .collect();
        batch.push(ForecastInput {
            entity_id: day.place_id.clone(),
            date: day.date,
            weather: layout.weather_vector(day)?,
            lags,
        });
    }
    Ok(batch)
}
