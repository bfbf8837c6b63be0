use crate::models::request_params::{DateRange, WeatherLocation};

/// Query for a batch of locations sharing one forecast window.
///
/// Open-Meteo accepts comma-separated coordinate lists and answers with one
/// result per coordinate pair, in the same order.
pub fn forecast_params(
    locations: &[WeatherLocation],
    days: u8,
    variables: &[String],
) -> Vec<(String, String)> {
    let mut params = coordinate_params(locations);
    params.push(("forecast_days".to_string(), days.to_string()));
    params.extend(common_params(variables));
    params
}

/// Query for one location over its own archive range.
pub fn archive_params(
    location: &WeatherLocation,
    range: &DateRange,
    variables: &[String],
) -> Vec<(String, String)> {
    let mut params = coordinate_params(std::slice::from_ref(location));
    params.push(("start_date".to_string(), range.start.format("%Y-%m-%d").to_string()));
    params.push(("end_date".to_string(), range.end.format("%Y-%m-%d").to_string()));
    params.extend(common_params(variables));
    params
}

fn coordinate_params(locations: &[WeatherLocation]) -> Vec<(String, String)> {
    let join = |f: fn(&WeatherLocation) -> f64| {
        locations
            .iter()
            .map(|l| f(l).to_string())
            .collect::<Vec<_>>()
            .join(",")
    };
    vec![
        ("latitude".to_string(), join(|l| l.coords.latitude)),
        ("longitude".to_string(), join(|l| l.coords.longitude)),
    ]
}

fn common_params(variables: &[String]) -> Vec<(String, String)> {
    vec![
        ("daily".to_string(), variables.join(",")),
        ("timeformat".to_string(), "unixtime".to_string()),
        ("timezone".to_string(), "GMT".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::request_params::LatLon;

    fn loc(id: &str, lat: f64, lon: f64) -> WeatherLocation {
        WeatherLocation {
            place_id: id.to_string(),
            coords: LatLon {
                latitude: lat,
                longitude: lon,
            },
        }
    }

    fn get<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn forecast_joins_coordinates_in_order() {
        let vars = vec!["rain_sum".to_string(), "sunrise".to_string()];
        let p = forecast_params(&[loc("a", 58.41, 15.62), loc("b", 58.59, 16.18)], 10, &vars);
        assert_eq!(get(&p, "latitude"), Some("58.41,58.59"));
        assert_eq!(get(&p, "longitude"), Some("15.62,16.18"));
        assert_eq!(get(&p, "forecast_days"), Some("10"));
        assert_eq!(get(&p, "daily"), Some("rain_sum,sunrise"));
        assert_eq!(get(&p, "timeformat"), Some("unixtime"));
    }

    #[test]
    fn archive_carries_its_own_range() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        );
        let p = archive_params(&loc("a", 1.5, 2.5), &range, &["rain_sum".to_string()]);
        assert_eq!(get(&p, "start_date"), Some("2023-01-01"));
        assert_eq!(get(&p, "end_date"), Some("2023-12-31"));
        assert_eq!(get(&p, "forecast_days"), None);
    }
}
