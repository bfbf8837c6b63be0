//! Sensor-id routing.
//!
//! aqicn.org serves two kinds of data under different id shapes:
//!
//! * `@<digits>` : a physical monitoring station. Its PM2.5 reading is
//!   published under the `pm25` field.
//! * `A<digits>` or bare `<digits>` : an area (interpolated) feed. The same
//!   quantity is published as `median` and has to be renamed on ingest.
//!
//! Anything else is rejected: field mapping depends on the provenance, and a
//! wrong guess would silently load the wrong column.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::IngestError;

/// Name of the canonical PM2.5 field after routing.
pub const PM25_FIELD: &str = "pm25";
/// Name of the PM2.5 field in area feeds and area CSV exports.
pub const AREA_VALUE_FIELD: &str = "median";

/// Data provenance encoded in the sensor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// `@<digits>`
    Station,
    /// `A<digits>` or `<digits>`
    Area,
}

/// A validated aqicn.org sensor id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SensorId {
    raw: String,
    kind: SensorKind,
    number: String,
}

impl SensorId {
    /// Parse a raw id, failing on any format other than the three known ones.
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        let trimmed = raw.trim();
        let (kind, number) = if let Some(rest) = trimmed.strip_prefix('@') {
            (SensorKind::Station, rest)
        } else if let Some(rest) = trimmed.strip_prefix('A') {
            (SensorKind::Area, rest)
        } else {
            (SensorKind::Area, trimmed)
        };

        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IngestError::UnknownSensorFormat(raw.to_string()));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            kind,
            number: number.to_string(),
        })
    }

    /// The id exactly as configured (trimmed). Used as the entity id.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Path segment for the `/feed/<segment>/` endpoint.
    pub fn feed_path(&self) -> String {
        match self.kind {
            SensorKind::Station => format!("@{}", self.number),
            SensorKind::Area => format!("A{}", self.number),
        }
    }

    /// Source field that carries PM2.5 for this provenance.
    pub fn value_field(&self) -> &'static str {
        match self.kind {
            SensorKind::Station => PM25_FIELD,
            SensorKind::Area => AREA_VALUE_FIELD,
        }
    }

    /// Rename provenance-specific fields to their canonical names.
    ///
    /// Station records pass through untouched. Area records have `median`
    /// renamed to `pm25`; a stray `pm25` in an area record is discarded in
    /// favour of the `median` value. Field order is preserved.
    pub fn route_fields<V>(&self, fields: IndexMap<String, V>) -> IndexMap<String, V> {
        match self.kind {
            SensorKind::Station => fields,
            SensorKind::Area => fields
                .into_iter()
                .filter(|(name, _)| name != PM25_FIELD)
                .map(|(name, value)| {
                    if name == AREA_VALUE_FIELD {
                        (PM25_FIELD.to_string(), value)
                    } else {
                        (name, value)
                    }
                })
                .collect(),
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for SensorId {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SensorId {
    type Error = IngestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SensorId> for String {
    fn from(value: SensorId) -> Self {
        value.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, f64)]) -> IndexMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn parses_the_three_known_shapes() {
        let station = SensorId::parse("@13986").unwrap();
        assert_eq!(station.kind(), SensorKind::Station);
        assert_eq!(station.feed_path(), "@13986");

        let area = SensorId::parse("A12345").unwrap();
        assert_eq!(area.kind(), SensorKind::Area);
        assert_eq!(area.feed_path(), "A12345");

        let bare = SensorId::parse("60886").unwrap();
        assert_eq!(bare.kind(), SensorKind::Area);
        assert_eq!(bare.feed_path(), "A60886");
        assert_eq!(bare.as_str(), "60886");
    }

    #[test]
    fn rejects_unknown_prefixes() {
        for raw in ["#123", "B123", "@", "A", "", "@12x", "station-1"] {
            let err = SensorId::parse(raw).unwrap_err();
            assert!(
                matches!(err, IngestError::UnknownSensorFormat(ref s) if s == raw),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn area_median_becomes_pm25() {
        let id = SensorId::parse("A12345").unwrap();
        let routed = id.route_fields(fields(&[("median", 7.0), ("pm10", 3.0)]));
        assert_eq!(routed.get("pm25"), Some(&7.0));
        assert!(!routed.contains_key("median"));
        assert_eq!(routed.get_index(0).map(|(k, _)| k.as_str()), Some("pm25"));
    }

    #[test]
    fn station_pm25_passes_through_unchanged() {
        let id = SensorId::parse("@999").unwrap();
        let input = fields(&[("pm25", 7.0), ("median", 1.0)]);
        let routed = id.route_fields(input.clone());
        assert_eq!(routed, input);
    }

    #[test]
    fn serde_goes_through_validation() {
        let ok: SensorId = serde_json::from_str("\"@42\"").unwrap();
        assert_eq!(ok.as_str(), "@42");
        assert!(serde_json::from_str::<SensorId>("\"?42\"").is_err());
    }
}
