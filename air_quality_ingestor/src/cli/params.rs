use chrono::NaiveDate;

use crate::{
    errors::IngestError,
    models::{
        request_params::{DateRange, WeatherWindow},
        sensor::SensorId,
    },
};

pub fn parse_sensor_list(ids: &str) -> Result<Vec<SensorId>, IngestError> {
    ids.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SensorId::parse)
        .collect()
}

pub fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date {s:?} (expected YYYY-MM-DD): {e}"))
}

/// Resolve the weather window flags. Archive ranges are repeated for every
/// location.
pub fn weather_window(
    forecast_days: Option<u8>,
    start: Option<&str>,
    end: Option<&str>,
    locations: usize,
) -> Result<WeatherWindow, String> {
    match (forecast_days, start, end) {
        (Some(days), None, None) => Ok(WeatherWindow::Forecast { days }),
        (None, Some(start), Some(end)) => {
            let range = DateRange::new(parse_date_arg(start)?, parse_date_arg(end)?);
            Ok(WeatherWindow::Archive(vec![range; locations]))
        }
        _ => Err("pass either --forecast-days or both --start and --end".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensor_list() {
        let ids = parse_sensor_list(" @13986, A60886 ,,").unwrap();
        let raw: Vec<_> = ids.iter().map(|s| s.as_str()).collect();
        assert_eq!(raw, ["@13986", "A60886"]);

        assert!(parse_sensor_list("@1,#2").is_err());
    }

    #[test]
    fn test_weather_window() {
        assert_eq!(
            weather_window(Some(7), None, None, 3).unwrap(),
            WeatherWindow::Forecast { days: 7 }
        );

        let WeatherWindow::Archive(ranges) =
            weather_window(None, Some("2024-01-01"), Some("2024-02-01"), 2).unwrap()
        else {
            panic!("expected archive window");
        };
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], ranges[1]);

        assert!(weather_window(None, None, None, 1).is_err());
        assert!(weather_window(None, Some("2024/01/01"), Some("2024-02-01"), 1).is_err());
    }
}
