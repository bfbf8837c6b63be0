use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{errors::IngestError, models::request_params::LatLon, models::sensor::SensorId};

/// Static reference data for one monitored location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Sensor id; doubles as the entity id throughout the pipeline.
    pub id: String,
    pub street: String,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    pub fn sensor(&self) -> Result<SensorId, IngestError> {
        SensorId::parse(&self.id)
    }

    pub fn coords(&self) -> LatLon {
        LatLon {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// "City (Street)" label used in chart titles.
    pub fn label(&self) -> String {
        format!("{} ({})", self.city, self.street)
    }
}

/// Places keyed by their configuration key. Order is significant: weather
/// responses are aligned to places by position.
pub type Places = IndexMap<String, Place>;

/// Parse a places JSON document (`{ "<key>": { "id": ..., ... }, ... }`).
///
/// Every place id must be a valid sensor id and ids must be unique.
pub fn parse_places(json: &str) -> Result<Places, IngestError> {
    let places: Places =
        serde_json::from_str(json).map_err(|e| IngestError::Places(e.to_string()))?;

    let mut seen = std::collections::HashSet::new();
    for (key, place) in &places {
        place.sensor()?;
        if !seen.insert(place.id.as_str()) {
            return Err(IngestError::Places(format!(
                "duplicate place id {:?} (key {key:?})",
                place.id
            )));
        }
    }
    Ok(places)
}

/// Read and validate a places file.
pub fn load_places(path: impl AsRef<Path>) -> Result<Places, IngestError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IngestError::MissingInput(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_places(&text)
}

/// Find the place whose id equals `id`.
pub fn find_place<'a>(places: &'a Places, id: &str) -> Option<&'a Place> {
    places.values().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACES: &str = r#"{
        "linkoping": {"id": "@13986", "street": "Hamngatan", "city": "Linköping",
                      "country": "Sweden", "latitude": 58.41, "longitude": 15.62},
        "norrkoping": {"id": "A60886", "street": "Kungsgatan", "city": "Norrköping",
                       "country": "Sweden", "latitude": 58.59, "longitude": 16.18}
    }"#;

    #[test]
    fn parses_and_keeps_order() {
        let places = parse_places(PLACES).unwrap();
        let keys: Vec<_> = places.keys().map(String::as_str).collect();
        assert_eq!(keys, ["linkoping", "norrkoping"]);
        assert_eq!(places["norrkoping"].label(), "Norrköping (Kungsgatan)");
        assert!(find_place(&places, "@13986").is_some());
    }

    #[test]
    fn rejects_bad_sensor_ids() {
        let json = PLACES.replace("A60886", "X60886");
        assert!(matches!(
            parse_places(&json),
            Err(IngestError::UnknownSensorFormat(_))
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let json = PLACES.replace("A60886", "@13986");
        assert!(matches!(parse_places(&json), Err(IngestError::Places(_))));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = load_places("/nonexistent/places.json").unwrap_err();
        assert!(matches!(err, IngestError::MissingInput(_)));
    }
}
