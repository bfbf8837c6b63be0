//! Per-run wiring of configuration, storage and providers.

use air_quality_ingestor::{
    config::IngestConfig,
    models::place::{Places, load_places},
    providers::{
        AirQualityProvider, WeatherProvider, aqicn::AqicnProvider, open_meteo::OpenMeteoProvider,
    },
};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::PipelineConfig, features::lag::LagSet, model::registry::LocalModelRegistry,
    store::LocalFeatureStore,
};

/// The two external data sources.
pub struct Providers {
    pub air_quality: Box<dyn AirQualityProvider>,
    pub weather: Box<dyn WeatherProvider>,
}

impl Providers {
    /// aqicn.org and Open-Meteo clients. Fails when the aqicn token is not
    /// set in the environment.
    pub fn live(config: &IngestConfig) -> anyhow::Result<Self> {
        let air_quality = AqicnProvider::new(config).with_context(|| {
            format!("air-quality feed token (set {})", config.token_env)
        })?;
        let weather = OpenMeteoProvider::new(config).context("weather client")?;
        Ok(Self {
            air_quality: Box::new(air_quality),
            weather: Box::new(weather),
        })
    }
}

/// Everything one pipeline command needs. Built per command and dropped at
/// the end of the run.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub lags: LagSet,
    pub tz: Tz,
    /// Calendar date of the run in the configured time zone.
    pub today: NaiveDate,
    pub run_id: Uuid,
    pub places: Places,
    pub store: LocalFeatureStore,
    pub registry: LocalModelRegistry,
    providers: Option<Providers>,
}

/// Today's date in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

impl PipelineContext {
    /// Open the store, registry and places file. `today` overrides the
    /// clock.
    pub fn open(config: PipelineConfig, today: Option<NaiveDate>) -> anyhow::Result<Self> {
        let tz = config.timezone()?;
        let lags = config.lag_set()?;
        let today = today.unwrap_or_else(|| today_in(tz));
        let places = load_places(&config.project.places_file).context("load places file")?;
        let store = LocalFeatureStore::open(&config.project.store_dir)
            .context("open feature store")?;
        let registry = LocalModelRegistry::new(&config.project.model_dir);
        std::fs::create_dir_all(&config.project.output_dir).with_context(|| {
            format!("create output dir {}", config.project.output_dir.display())
        })?;

        let run_id = Uuid::new_v4();
        debug!(%run_id, %today, places = places.len(), "pipeline context opened");
        Ok(Self {
            config,
            lags,
            tz,
            today,
            run_id,
            places,
            store,
            registry,
            providers: None,
        })
    }

    pub fn with_providers(mut self, providers: Providers) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn providers(&self) -> anyhow::Result<&Providers> {
        self.providers
            .as_ref()
            .context("this command needs data providers but none were configured")
    }
}
