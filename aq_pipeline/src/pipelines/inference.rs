//! Batch inference: chained forecasts from tomorrow through the horizon.

use std::path::PathBuf;

use air_quality_ingestor::models::weather::WeatherDay;
use anyhow::Context;
use chrono::Duration;
use tracing::{info, warn};

use crate::{
    charts::{ChartSpec, Series, file_stem, render_svg},
    features::{
        assembly::{FeatureLayout, inference_batch},
        chain::{ForecastRow, chain_forecasts},
        lag::{LagSet, LaggedObservation},
    },
    pipelines::PipelineContext,
    store::{DateFilter, FeatureStore},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct InferenceOptions {
    /// Registered version to use; latest when absent.
    pub model_version: Option<u32>,
}

#[derive(Debug)]
pub struct InferenceOutcome {
    pub model_version: u32,
    pub forecasts: Vec<ForecastRow>,
    pub charts: Vec<PathBuf>,
}

/// Forecast every place for the stored weather-forecast days after today and
/// store the predictions with `forecast_on = today`.
pub fn run_inference(
    ctx: &PipelineContext,
    opt: InferenceOptions,
) -> anyhow::Result<InferenceOutcome> {
    let name = &ctx.config.model.name;
    let (model, card) = ctx
        .registry
        .load(name, opt.model_version)
        .with_context(|| format!("load model {name}"))?;
    let lags = LagSet::new(card.lags.iter().copied())
        .with_context(|| format!("lag set of {name} v{}", card.version))?;
    if lags != ctx.lags {
        warn!(model = ?lags.as_slice(), configured = ?ctx.lags.as_slice(), "model lags differ from configuration; using the model's");
    }
    let layout = FeatureLayout::from_feature_names(&card.feature_names, lags.clone())
        .with_context(|| format!("feature layout of {name} v{}", card.version))?;

    let groups = ctx.groups()?;
    let start = ctx.today + Duration::days(1);
    let end = ctx.today + Duration::days(i64::from(ctx.config.features.forecast_days));
    let weather: Vec<WeatherDay> = ctx
        .store
        .read(&groups.weather, DateFilter::between(start, end))
        .context("read weather forecast")?;
    let lagged: Vec<LaggedObservation> = ctx
        .store
        .read(&groups.lagged, DateFilter::all())
        .context("read lagged features")?;

    let mut batch =
        inference_batch(&weather, &lagged, &layout, start).context("assemble inference batch")?;
    if batch.is_empty() {
        warn!(%start, %end, "no weather forecast rows to predict");
    }
    let forecasts = chain_forecasts(&mut batch, &lags, &model, ctx.today)
        .context("chain forecasts")?;
    ctx.store
        .insert(&groups.forecasts, &forecasts)
        .context("write forecasts")?;
    info!(model_version = card.version, rows = forecasts.len(), forecast_on = %ctx.today, "forecasts stored");

    let charts = forecast_charts(ctx, &forecasts)?;
    Ok(InferenceOutcome {
        model_version: card.version,
        forecasts,
        charts,
    })
}

fn forecast_charts(ctx: &PipelineContext, forecasts: &[ForecastRow]) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (key, place) in &ctx.places {
        let points: Vec<_> = forecasts
            .iter()
            .filter(|f| f.entity_id == place.id)
            .map(|f| (f.date, f.predicted_pm25))
            .collect();
        if points.is_empty() {
            continue;
        }
        let spec = ChartSpec::new(format!("PM2.5 forecast: {}", place.label()))
            .with_series(Series::line(format!("Forecast made {}", ctx.today), points))
            .with_aqi_bands();
        let path = ctx
            .config
            .project
            .output_dir
            .join(format!("forecast_{}.svg", file_stem(key)));
        render_svg(&spec, &path).with_context(|| format!("render {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
