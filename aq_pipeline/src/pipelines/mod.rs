//! The five pipeline commands.
//!
//! Every command runs against a [`PipelineContext`] built from the
//! configuration. Commands that fetch data finish every network call before
//! their first feature-store write, so an exhausted retry never leaves a
//! half-committed run behind.

pub mod backfill;
pub mod context;
pub mod daily;
pub mod dashboard;
pub mod inference;
pub mod training;

use air_quality_ingestor::models::observation::Observation;
use anyhow::Context;
use tracing::info;

pub use context::{PipelineContext, Providers};

use crate::{
    config::GroupRef,
    features::lag::add_lagged,
    store::{DateFilter, FeatureGroup, FeatureGroupSpec, FeatureStore},
};

/// Handles to the four feature groups a run touches.
#[derive(Debug, Clone)]
pub struct Groups {
    pub air_quality: FeatureGroup,
    pub weather: FeatureGroup,
    pub lagged: FeatureGroup,
    pub forecasts: FeatureGroup,
}

fn spec(group: &GroupRef, description: &str) -> FeatureGroupSpec {
    FeatureGroupSpec::keyed_by_id(&group.name, group.version, description)
}

impl PipelineContext {
    /// Register (or look up) every configured feature group.
    pub fn groups(&self) -> anyhow::Result<Groups> {
        let cfg = &self.config.groups;
        let mut forecasts = spec(&cfg.forecasts, "Chained PM2.5 forecasts per forecast day");
        forecasts.primary_key.push("forecast_on".to_string());

        let open = |s: FeatureGroupSpec| {
            self.store
                .get_or_create_group(&s)
                .with_context(|| format!("feature group {} v{}", s.name, s.version))
        };
        Ok(Groups {
            air_quality: open(spec(&cfg.air_quality, "Air Quality characteristics of each day"))?,
            weather: open(spec(&cfg.weather, "Weather characteristics of each day"))?,
            lagged: open(spec(
                &cfg.air_quality_lagged,
                "Air Quality characteristics of each day with lagged pm25 features",
            ))?,
            forecasts: open(forecasts)?,
        })
    }
}

/// Rebuild the lagged group from the full air-quality history.
///
/// Returns the number of lagged rows written.
pub fn recompute_lagged(ctx: &PipelineContext, groups: &Groups) -> anyhow::Result<usize> {
    let history: Vec<Observation> = ctx
        .store
        .read(&groups.air_quality, DateFilter::all())
        .context("read air-quality history")?;
    let lagged = add_lagged(&history, &ctx.lags).context("compute lag features")?;
    let summary = ctx
        .store
        .insert(&groups.lagged, &lagged)
        .context("write lagged features")?;
    info!(rows = lagged.len(), replaced = summary.replaced, "lagged features recomputed");
    Ok(lagged.len())
}
