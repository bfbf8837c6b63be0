//! Daily incremental update and optional forecast run.

use air_quality_ingestor::models::{
    observation::Observation,
    request_params::{WeatherLocation, WeatherRequest},
};
use anyhow::Context;
use tracing::{info, warn};

use crate::{
    pipelines::{
        PipelineContext,
        inference::{InferenceOptions, InferenceOutcome, run_inference},
        recompute_lagged,
    },
    store::FeatureStore,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct DailyOptions {
    /// Stop after the feature update.
    pub skip_forecast: bool,
}

#[derive(Debug)]
pub struct DailyOutcome {
    pub readings: usize,
    pub weather_rows: usize,
    pub lagged_rows: usize,
    pub inference: Option<InferenceOutcome>,
}

/// Append today's reading of every place and the weather forecast, rebuild
/// lag features, then forecast unless `opt.skip_forecast`.
///
/// A reading without PM2.5 is dropped so it cannot replace a stored
/// measurement; that sensor's forecast seeds from its last measured day.
/// An out-of-range reading fails the run before anything is written.
pub async fn run_daily(ctx: &PipelineContext, opt: DailyOptions) -> anyhow::Result<DailyOutcome> {
    let providers = ctx.providers()?;

    let mut readings: Vec<Observation> = Vec::with_capacity(ctx.places.len());
    for place in ctx.places.values() {
        let sensor = place.sensor()?;
        let reading = providers
            .air_quality
            .latest(&sensor)
            .await
            .with_context(|| format!("latest reading of {}", place.label()))?;
        if reading.pm25.is_none() {
            warn!(sensor = %sensor, date = %reading.date, "reading carries no PM2.5 value, not stored");
            continue;
        }
        let observation = reading.to_observation();
        observation
            .check_range()
            .with_context(|| format!("latest reading of {}", place.label()))?;
        readings.push(observation);
    }

    let locations = ctx
        .places
        .values()
        .map(|p| WeatherLocation {
            place_id: p.id.clone(),
            coords: p.coords(),
        })
        .collect();
    let request = WeatherRequest::forecast(locations, ctx.config.features.forecast_days);
    let weather = providers
        .weather
        .daily(&request)
        .await
        .context("fetch weather forecast")?;

    let groups = ctx.groups()?;
    ctx.store
        .insert(&groups.air_quality, &readings)
        .context("write readings")?;
    ctx.store
        .insert(&groups.weather, &weather)
        .context("write weather forecast")?;
    let lagged_rows = recompute_lagged(ctx, &groups)?;
    info!(readings = readings.len(), weather_rows = weather.len(), "daily features updated");

    let inference = if opt.skip_forecast {
        None
    } else {
        Some(run_inference(
            ctx,
            InferenceOptions {
                model_version: ctx.config.model.version,
            },
        )?)
    };

    Ok(DailyOutcome {
        readings: readings.len(),
        weather_rows: weather.len(),
        lagged_rows,
        inference,
    })
}
