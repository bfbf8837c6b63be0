//! Canonical row types produced by the ingestor.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{errors::IngestError, models::sensor::SensorId};

/// Exclusive lower bound on an accepted PM2.5 value.
pub const PM25_MIN: f64 = -0.1;
/// Inclusive upper bound on an accepted PM2.5 value.
pub const PM25_MAX: f64 = 500.0;

/// One measured quantity for one entity on one day.
///
/// `(entity_id, date)` is the key. A missing measurement is `None`, never a
/// zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub entity_id: String,
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(entity_id: impl Into<String>, date: NaiveDate, value: Option<f64>) -> Self {
        Self {
            entity_id: entity_id.into(),
            date,
            value,
        }
    }

    /// Fails when the value lies outside `(PM25_MIN, PM25_MAX]`. A missing
    /// value passes.
    pub fn check_range(&self) -> Result<(), IngestError> {
        match self.value {
            Some(v) if !(v > PM25_MIN && v <= PM25_MAX) => Err(IngestError::OutOfRange {
                entity: self.entity_id.clone(),
                date: self.date,
                value: v,
            }),
            _ => Ok(()),
        }
    }
}

/// Latest reading returned by the air-quality feed, after sensor routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedReading {
    pub sensor: SensorId,
    /// Station or area name as published by the feed.
    pub name: String,
    /// Public page of the station, when the feed provides it.
    pub url: Option<String>,
    /// Calendar date of the measurement in the station's local time.
    pub date: NaiveDate,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
}

impl FeedReading {
    /// The PM2.5 part of the reading as an observation of this sensor.
    pub fn to_observation(&self) -> Observation {
        Observation::new(self.sensor.as_str(), self.date, self.pm25)
    }
}
