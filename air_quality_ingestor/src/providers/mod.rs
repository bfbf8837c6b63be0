//! Provider abstraction for the pipeline's two external data sources.
//!
//! [`AirQualityProvider`] returns the latest daily reading of one sensor and
//! [`WeatherProvider`] returns daily weather for a batch of locations. Both
//! traits are object safe so pipelines can hold `Box<dyn ...>` and tests can
//! substitute in-memory fakes.

pub mod aqicn;
pub mod open_meteo;

use async_trait::async_trait;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{
    observation::FeedReading, request_params::WeatherRequest, sensor::SensorId,
    weather::WeatherDay,
};

/// Latest air-quality reading for a single sensor.
#[async_trait]
pub trait AirQualityProvider: Send + Sync {
    /// Fetch the most recent reading published for `sensor`.
    ///
    /// The returned reading has already been routed: its `pm25` is read
    /// from whichever field carries PM2.5 for the sensor's provenance.
    async fn latest(&self, sensor: &SensorId) -> Result<FeedReading, ProviderError>;
}

/// Daily weather for a batch of locations.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch daily weather. Rows with any missing variable are dropped.
    async fn daily(&self, request: &WeatherRequest) -> Result<Vec<WeatherDay>, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"), context(false))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a provider implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// Network failure, timeout or body read error.
    #[snafu(display("API request failed: {source}"), context(false))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// Non-success HTTP status.
    #[snafu(display("HTTP {status}: {body}"))]
    Status {
        status: u16,
        body: String,
        backtrace: Backtrace,
    },

    /// The API answered with an explicit error payload (e.g. invalid token).
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request was rejected before it was sent.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// The response did not have the expected shape.
    #[snafu(display("Unexpected response: {message}"))]
    Decode {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}

impl ProviderError {
    /// Whether a retry has a reasonable chance to succeed.
    ///
    /// Timeouts, connection failures, HTTP 429 and 5xx are transient;
    /// everything else is a property of the request and will fail again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Reqwest { source, .. } => {
                source.is_timeout()
                    || source.is_connect()
                    || source
                        .status()
                        .is_some_and(|s| s.as_u16() == 429 || s.is_server_error())
            }
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let retryable = |status: u16| {
            StatusSnafu {
                status,
                body: String::new(),
            }
            .build()
            .is_retryable()
        };
        assert!(retryable(429));
        assert!(retryable(500));
        assert!(retryable(503));
        assert!(!retryable(400));
        assert!(!retryable(401));
        assert!(!retryable(404));
    }

    #[test]
    fn api_and_decode_errors_are_final() {
        assert!(!ApiSnafu { message: "Invalid key" }.build().is_retryable());
        assert!(!DecodeSnafu { message: "bad json" }.build().is_retryable());
    }
}
