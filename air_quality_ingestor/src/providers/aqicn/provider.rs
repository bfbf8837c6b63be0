use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use governor::DefaultDirectRateLimiter;
use indexmap::IndexMap;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_secret_env_var;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    config::IngestConfig,
    models::{observation::FeedReading, sensor::SensorId},
    providers::{
        AirQualityProvider, ApiSnafu, ClientBuildSnafu, DecodeSnafu, ProviderError,
        ProviderInitError, StatusSnafu,
        aqicn::{
            rate_limiter,
            response::{AqicnFeed, AqicnResponse},
        },
    },
    retry::{RetryPolicy, with_retry},
};

pub struct AqicnProvider {
    client: Client,
    base_url: String,
    token: SecretString,
    limiter: DefaultDirectRateLimiter,
    retry: RetryPolicy,
}

impl AqicnProvider {
    /// Creates a new aqicn provider.
    ///
    /// Reads the API token from the environment variable named by
    /// `config.token_env` (`AQICN_ORG_API_TOKEN` by default).
    pub fn new(config: &IngestConfig) -> Result<Self, ProviderInitError> {
        let token = get_secret_env_var(&config.token_env)?;
        Self::with_token(config, token)
    }

    /// Creates a provider with an explicit token.
    pub fn with_token(config: &IngestConfig, token: SecretString) -> Result<Self, ProviderInitError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: config.feed_base_url.trim_end_matches('/').to_string(),
            token,
            limiter: rate_limiter(config.requests_per_second),
            retry: config.retry,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<AqicnResponse, ProviderError> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .query(&[("token", self.token.expose_secret())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return StatusSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        Ok(response.json::<AqicnResponse>().await?)
    }
}

#[async_trait]
impl AirQualityProvider for AqicnProvider {
    async fn latest(&self, sensor: &SensorId) -> Result<FeedReading, ProviderError> {
        let url = format!("{}/feed/{}/", self.base_url, sensor.feed_path());
        debug!(sensor = %sensor, "fetching latest feed reading");

        let url = url.as_str();
        let response = with_retry(self.retry, url, move || self.fetch_once(url)).await?;
        parse_feed(sensor, response)
    }
}

/// Turn a feed envelope into a routed reading.
pub(crate) fn parse_feed(
    sensor: &SensorId,
    response: AqicnResponse,
) -> Result<FeedReading, ProviderError> {
    if response.status != "ok" {
        let message = match response.data {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        return ApiSnafu { message }.fail();
    }

    let feed: AqicnFeed = serde_json::from_value(response.data).map_err(|e| {
        DecodeSnafu {
            message: format!("feed for {sensor}: {e}"),
        }
        .build()
    })?;

    let date_part = feed.time.s.get(..10).unwrap_or(&feed.time.s);
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
        DecodeSnafu {
            message: format!("feed time {:?}: {e}", feed.time.s),
        }
        .build()
    })?;

    let values: IndexMap<String, f64> = feed
        .iaqi
        .into_iter()
        .map(|(field, value)| (field, value.v))
        .collect();
    let values = sensor.route_fields(values);

    Ok(FeedReading {
        sensor: sensor.clone(),
        name: feed.city.name,
        url: feed.city.url,
        date,
        pm25: values.get("pm25").copied(),
        pm10: values.get("pm10").copied(),
        no2: values.get("no2").copied(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> AqicnResponse {
        serde_json::from_str(json).unwrap()
    }

    const STATION: &str = r#"{
        "status": "ok",
        "data": {
            "aqi": 21,
            "city": {"geo": [58.41, 15.62], "name": "Linköping Hamngatan", "url": "https://aqicn.org/city/x"},
            "iaqi": {"no2": {"v": 4.1}, "pm10": {"v": 9}, "pm25": {"v": 21}},
            "time": {"s": "2024-11-05 14:00:00", "tz": "+01:00"}
        }
    }"#;

    #[test]
    fn station_feed_reads_pm25() {
        let id = SensorId::parse("@13986").unwrap();
        let reading = parse_feed(&id, envelope(STATION)).unwrap();
        assert_eq!(reading.pm25, Some(21.0));
        assert_eq!(reading.pm10, Some(9.0));
        assert_eq!(reading.date, NaiveDate::from_ymd_opt(2024, 11, 5).unwrap());
        assert_eq!(reading.name, "Linköping Hamngatan");
    }

    #[test]
    fn area_feed_reads_median_as_pm25() {
        let json = r#"{
            "status": "ok",
            "data": {
                "city": {"name": "Norrköping"},
                "iaqi": {"median": {"v": 7}, "pm25": {"v": 99}},
                "time": {"s": "2024-11-05 09:00:00"}
            }
        }"#;
        let id = SensorId::parse("A60886").unwrap();
        let reading = parse_feed(&id, envelope(json)).unwrap();
        assert_eq!(reading.pm25, Some(7.0));
        assert_eq!(reading.to_observation().entity_id, "A60886");
    }

    #[test]
    fn error_status_becomes_api_error() {
        let id = SensorId::parse("@1").unwrap();
        let err = parse_feed(&id, envelope(r#"{"status": "error", "data": "Invalid key"}"#))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { ref message, .. } if message == "Invalid key"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_pm25_is_none_not_zero() {
        let json = r#"{"status": "ok", "data": {"city": {"name": "x"}, "iaqi": {}, "time": {"s": "2024-01-02 00:00:00"}}}"#;
        let id = SensorId::parse("@1").unwrap();
        assert_eq!(parse_feed(&id, envelope(json)).unwrap().pm25, None);
    }
}
