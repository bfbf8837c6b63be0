use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use governor::DefaultDirectRateLimiter;
use indexmap::IndexMap;
use reqwest::Client;
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::{
    config::IngestConfig,
    models::{
        request_params::{WeatherLocation, WeatherRequest, WeatherWindow},
        weather::{WeatherDay, is_timestamp_variable},
    },
    providers::{
        ApiSnafu, ClientBuildSnafu, DecodeSnafu, ProviderError, ProviderInitError, StatusSnafu,
        ValidationSnafu, WeatherProvider,
        aqicn::rate_limiter,
        open_meteo::{
            params::{archive_params, forecast_params},
            response::{OpenMeteoError, OpenMeteoLocation, OpenMeteoResponse},
        },
    },
    retry::{RetryPolicy, with_retry},
};

pub struct OpenMeteoProvider {
    client: Client,
    archive_url: String,
    forecast_url: String,
    limiter: DefaultDirectRateLimiter,
    retry: RetryPolicy,
}

impl OpenMeteoProvider {
    /// Open-Meteo needs no credentials.
    pub fn new(config: &IngestConfig) -> Result<Self, ProviderInitError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            archive_url: config.weather_archive_url.clone(),
            forecast_url: config.weather_forecast_url.clone(),
            limiter: rate_limiter(config.requests_per_second),
            retry: config.retry,
        })
    }

    async fn fetch_once(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<OpenMeteoResponse, ProviderError> {
        self.limiter.until_ready().await;

        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            if status.is_client_error() && status.as_u16() != 429 {
                if let Ok(err) = serde_json::from_str::<OpenMeteoError>(&body) {
                    return ApiSnafu { message: err.reason }.fail();
                }
            }
            return StatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        Ok(response.json::<OpenMeteoResponse>().await?)
    }

    async fn fetch(
        &self,
        url: &str,
        query: Vec<(String, String)>,
    ) -> Result<Vec<OpenMeteoLocation>, ProviderError> {
        let query = query.as_slice();
        let response = with_retry(self.retry, url, move || self.fetch_once(url, query)).await?;
        Ok(response.into_locations())
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn daily(&self, request: &WeatherRequest) -> Result<Vec<WeatherDay>, ProviderError> {
        request
            .validate()
            .map_err(|message| ValidationSnafu { message }.build())?;

        let mut rows = Vec::new();
        match &request.window {
            WeatherWindow::Forecast { days } => {
                let query = forecast_params(&request.locations, *days, &request.variables);
                let results = self.fetch(&self.forecast_url, query).await?;
                if results.len() != request.locations.len() {
                    return DecodeSnafu {
                        message: format!(
                            "{} results for {} locations",
                            results.len(),
                            request.locations.len()
                        ),
                    }
                    .fail();
                }
                for (location, result) in request.locations.iter().zip(results) {
                    rows.extend(to_weather_days(location, &request.variables, result)?);
                }
            }
            WeatherWindow::Archive(ranges) => {
                for (location, range) in request.locations.iter().zip(ranges) {
                    let query = archive_params(location, range, &request.variables);
                    let mut results = self.fetch(&self.archive_url, query).await?;
                    let result = results.pop().ok_or_else(|| {
                        DecodeSnafu {
                            message: format!("empty archive response for {}", location.place_id),
                        }
                        .build()
                    })?;
                    rows.extend(to_weather_days(location, &request.variables, result)?);
                }
            }
        }
        Ok(rows)
    }
}

/// Pivot one location's column-oriented response into rows.
///
/// Days with a missing value in any requested variable are dropped.
pub(crate) fn to_weather_days(
    location: &WeatherLocation,
    variables: &[String],
    result: OpenMeteoLocation,
) -> Result<Vec<WeatherDay>, ProviderError> {
    let daily = result.daily;
    let days = daily.time.len();

    for var in variables {
        match daily.series.get(var) {
            Some(values) if values.len() == days => {}
            Some(values) => {
                return DecodeSnafu {
                    message: format!("{var}: {} values for {days} days", values.len()),
                }
                .fail();
            }
            None => {
                return DecodeSnafu {
                    message: format!("variable {var} missing from response"),
                }
                .fail();
            }
        }
    }

    let mut rows = Vec::with_capacity(days);
    let mut dropped = 0usize;
    'days: for (i, ts) in daily.time.iter().enumerate() {
        let date = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| {
                DecodeSnafu {
                    message: format!("timestamp {ts} out of range"),
                }
                .build()
            })?
            .date_naive();

        let mut measures = IndexMap::new();
        let mut sunrise = 0;
        let mut sunset = 0;
        for var in variables {
            let Some(value) = daily.series.get(var).and_then(|v| v[i]) else {
                dropped += 1;
                continue 'days;
            };
            match var.as_str() {
                "sunrise" => sunrise = value as i64,
                "sunset" => sunset = value as i64,
                _ if is_timestamp_variable(var) => {}
                _ => {
                    measures.insert(var.clone(), value);
                }
            }
        }

        rows.push(WeatherDay {
            place_id: location.place_id.clone(),
            date,
            measures,
            sunrise,
            sunset,
        });
    }

    if dropped > 0 {
        warn!(place = %location.place_id, dropped, "dropped weather days with missing values");
    }
    debug!(place = %location.place_id, rows = rows.len(), "weather rows decoded");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request_params::LatLon;

    fn location() -> WeatherLocation {
        WeatherLocation {
            place_id: "@13986".to_string(),
            coords: LatLon {
                latitude: 58.41,
                longitude: 15.62,
            },
        }
    }

    fn vars() -> Vec<String> {
        ["rain_sum", "sunrise", "sunset", "temperature_2m_mean"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn pivots_and_drops_incomplete_days() {
        let json = r#"{
            "latitude": 58.4, "longitude": 15.6,
            "daily": {
                "time": [1704067200, 1704153600, 1704240000],
                "rain_sum": [0.5, null, 1.0],
                "sunrise": [1704095000, 1704181400, 1704267800],
                "sunset": [1704120000, 1704206400, 1704292800],
                "temperature_2m_mean": [-3.2, -4.0, -1.5]
            }
        }"#;
        let parsed: OpenMeteoResponse = serde_json::from_str(json).unwrap();
        let result = parsed.into_locations().pop().unwrap();
        let rows = to_weather_days(&location(), &vars(), result).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date.to_string(), "2024-01-01");
        assert_eq!(rows[1].date.to_string(), "2024-01-03");
        assert_eq!(rows[0].sunrise, 1704095000);
        assert_eq!(rows[0].measure("rain_sum"), Some(0.5));
        assert_eq!(rows[0].measures.len(), 2);
        assert!(rows[0].measure("sunrise").is_none());
    }

    #[test]
    fn multi_location_array_is_accepted() {
        let json = r#"[
            {"daily": {"time": [1704067200], "rain_sum": [0.0]}},
            {"daily": {"time": [1704067200], "rain_sum": [2.0]}}
        ]"#;
        let parsed: OpenMeteoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_locations().len(), 2);
    }

    #[test]
    fn missing_variable_is_a_decode_error() {
        let json = r#"{"daily": {"time": [1704067200], "rain_sum": [0.0]}}"#;
        let parsed: OpenMeteoResponse = serde_json::from_str(json).unwrap();
        let result = parsed.into_locations().pop().unwrap();
        let err = to_weather_days(&location(), &vars(), result).unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
    }
}
