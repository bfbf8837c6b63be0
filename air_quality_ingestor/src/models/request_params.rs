use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::weather::DAILY_VARIABLES;

/// Open-Meteo accepts at most 16 forecast days.
pub const MAX_FORECAST_DAYS: u8 = 16;

/// Geographic coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

/// A place to fetch weather for. Results are aligned to these by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherLocation {
    pub place_id: String,
    pub coords: LatLon,
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

/// Which Open-Meteo endpoint to hit and for what period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeatherWindow {
    /// Historical archive, one date range per location (same order).
    Archive(Vec<DateRange>),
    /// Forecast starting today for the given number of days.
    Forecast { days: u8 },
}

/// Vendor-agnostic daily weather request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRequest {
    pub locations: Vec<WeatherLocation>,
    pub window: WeatherWindow,
    /// Daily variable names, in request order.
    pub variables: Vec<String>,
}

impl WeatherRequest {
    /// Archive request for the standard daily variable list.
    pub fn archive(locations: Vec<WeatherLocation>, ranges: Vec<DateRange>) -> Self {
        Self {
            locations,
            window: WeatherWindow::Archive(ranges),
            variables: default_variables(),
        }
    }

    /// Forecast request for the standard daily variable list.
    pub fn forecast(locations: Vec<WeatherLocation>, days: u8) -> Self {
        Self {
            locations,
            window: WeatherWindow::Forecast { days },
            variables: default_variables(),
        }
    }

    /// Check the request shape before any network call is made.
    pub fn validate(&self) -> Result<(), String> {
        if self.locations.is_empty() {
            return Err("no locations requested".to_string());
        }
        if self.variables.is_empty() {
            return Err("no daily variables requested".to_string());
        }
        match &self.window {
            WeatherWindow::Archive(ranges) => {
                if ranges.len() != self.locations.len() {
                    return Err(format!(
                        "{} date ranges for {} locations",
                        ranges.len(),
                        self.locations.len()
                    ));
                }
                if let Some(r) = ranges.iter().find(|r| r.start > r.end) {
                    return Err(format!("date range {} > {}", r.start, r.end));
                }
            }
            WeatherWindow::Forecast { days } => {
                if *days == 0 || *days > MAX_FORECAST_DAYS {
                    return Err(format!(
                        "forecast_days must be within 1..={MAX_FORECAST_DAYS}, got {days}"
                    ));
                }
            }
        }
        Ok(())
    }
}

fn default_variables() -> Vec<String> {
    DAILY_VARIABLES.iter().map(|v| v.to_string()).collect()
}
