//! Endpoint, credential and transport settings for the ingestor.
//!
//! The struct is plain TOML so it can live on its own (`aq-fetch --config`)
//! or be embedded as the `[ingest]` table of the pipeline configuration.
//! Credentials are never part of it; only the *name* of the env var holding
//! the aqicn token is.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{errors::IngestError, retry::RetryPolicy};

/// Transport configuration shared by all providers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Base URL of the aqicn.org / WAQI JSON API.
    pub feed_base_url: String,
    /// Name of the environment variable holding the aqicn API token.
    pub token_env: String,
    /// Open-Meteo historical archive endpoint.
    pub weather_archive_url: String,
    /// Open-Meteo forecast endpoint.
    pub weather_forecast_url: String,
    /// Client-side rate limit applied per provider.
    pub requests_per_second: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            feed_base_url: "https://api.waqi.info".to_string(),
            token_env: "AQICN_ORG_API_TOKEN".to_string(),
            weather_archive_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            weather_forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            requests_per_second: 5,
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl IngestConfig {
    /// Parse from a TOML string; missing keys fall back to the defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, IngestError> {
        toml::from_str(s).map_err(|e| IngestError::Malformed {
            path: "<ingest config>".to_string(),
            message: e.to_string(),
        })
    }

    /// Read and parse a standalone ingestor config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| IngestError::Malformed {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}
