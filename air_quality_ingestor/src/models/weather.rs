//! Daily weather rows.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Daily variables requested from Open-Meteo, in request order.
pub const DAILY_VARIABLES: [&str; 20] = [
    "wind_speed_10m_max",
    "wind_gusts_10m_max",
    "wind_direction_10m_dominant",
    "precipitation_sum",
    "precipitation_hours",
    "rain_sum",
    "snowfall_sum",
    "et0_fao_evapotranspiration",
    "shortwave_radiation_sum",
    "weather_code",
    "temperature_2m_max",
    "temperature_2m_min",
    "apparent_temperature_max",
    "apparent_temperature_min",
    "sunset",
    "sunrise",
    "daylight_duration",
    "sunshine_duration",
    "temperature_2m_mean",
    "apparent_temperature_mean",
];

/// Variables delivered as integer unix timestamps rather than floats.
pub const TIMESTAMP_VARIABLES: [&str; 2] = ["sunrise", "sunset"];

pub fn is_timestamp_variable(name: &str) -> bool {
    TIMESTAMP_VARIABLES.contains(&name)
}

/// The float-valued subset of [`DAILY_VARIABLES`], in request order.
pub fn measure_variables() -> Vec<&'static str> {
    DAILY_VARIABLES
        .iter()
        .copied()
        .filter(|v| !is_timestamp_variable(v))
        .collect()
}

/// One day of weather for one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDay {
    pub place_id: String,
    pub date: NaiveDate,
    /// Float-valued variables in request order.
    pub measures: IndexMap<String, f64>,
    pub sunrise: i64,
    pub sunset: i64,
}

impl WeatherDay {
    pub fn measure(&self, name: &str) -> Option<f64> {
        self.measures.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_variables_exclude_timestamps() {
        let m = measure_variables();
        assert_eq!(m.len(), DAILY_VARIABLES.len() - TIMESTAMP_VARIABLES.len());
        assert!(!m.contains(&"sunrise"));
        assert_eq!(m[0], "wind_speed_10m_max");
    }
}
