//! Measured history against forecasts made at different lead times.

use std::path::PathBuf;

use air_quality_ingestor::models::observation::Observation;
use anyhow::Context;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    charts::{ChartSpec, Series, file_stem, render_svg},
    features::chain::ForecastRow,
    pipelines::PipelineContext,
    store::{DateFilter, FeatureStore},
};

#[derive(Debug, Clone, Default)]
pub struct DashboardOptions {
    /// Output directory; the configured one when absent.
    pub out_dir: Option<PathBuf>,
}

/// A stored forecast with its lead time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub entity_id: String,
    pub date: NaiveDate,
    pub predicted_pm25: f64,
    pub forecast_on: NaiveDate,
    /// `|forecast_on - date|` in days.
    pub forecast_days_before: i64,
}

pub fn dashboard_rows(forecasts: &[ForecastRow]) -> Vec<DashboardRow> {
    forecasts
        .iter()
        .map(|f| DashboardRow {
            entity_id: f.entity_id.clone(),
            date: f.date,
            predicted_pm25: f.predicted_pm25,
            forecast_on: f.forecast_on,
            forecast_days_before: (f.date - f.forecast_on).num_days().abs(),
        })
        .collect()
}

/// Points of `entity` forecast exactly `lead` days ahead, sorted by date.
pub fn lead_series(rows: &[DashboardRow], entity: &str, lead: u32) -> Vec<(NaiveDate, f64)> {
    let mut points: Vec<_> = rows
        .iter()
        .filter(|r| r.entity_id == entity && r.forecast_days_before == i64::from(lead))
        .map(|r| (r.date, r.predicted_pm25))
        .collect();
    points.sort_by_key(|p| p.0);
    points
}

fn lead_label(lead: u32) -> String {
    match lead {
        1 => "Predicted 1 day ahead".to_string(),
        n => format!("Predicted {n} days ahead"),
    }
}

/// Render one dashboard chart per place. Returns the files written.
pub fn run_dashboard(ctx: &PipelineContext, opt: DashboardOptions) -> anyhow::Result<Vec<PathBuf>> {
    let cfg = &ctx.config.dashboard;
    let out_dir = opt
        .out_dir
        .unwrap_or_else(|| ctx.config.project.output_dir.clone());
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create {}", out_dir.display()))?;

    let from = ctx.today - Duration::days(i64::from(cfg.history_days));
    let to = ctx.today + Duration::days(i64::from(cfg.forecast_window_days));
    let groups = ctx.groups()?;
    let measured: Vec<Observation> = ctx
        .store
        .read(&groups.air_quality, DateFilter::between(from, ctx.today))
        .context("read measured history")?;
    let forecasts: Vec<ForecastRow> = ctx
        .store
        .read(&groups.forecasts, DateFilter::between(from, to))
        .context("read forecasts")?;
    let rows = dashboard_rows(&forecasts);
    debug!(measured = measured.len(), forecasts = rows.len(), "dashboard inputs loaded");

    let mut written = Vec::new();
    for (key, place) in &ctx.places {
        let history: Vec<_> = measured
            .iter()
            .filter(|o| o.entity_id == place.id)
            .filter_map(|o| o.value.map(|v| (o.date, v)))
            .collect();

        let mut spec = ChartSpec::new(format!("PM2.5 in {}", place.label()))
            .with_series(Series::points("Measured", history));
        for &lead in &cfg.lead_days {
            spec = spec.with_series(Series::line(lead_label(lead), lead_series(&rows, &place.id, lead)));
        }
        if spec.series.is_empty() {
            debug!(place = %key, "nothing to plot");
            continue;
        }

        let path = out_dir.join(format!("dashboard_{}.svg", file_stem(key)));
        render_svg(&spec.with_aqi_bands(), &path)
            .with_context(|| format!("render {}", path.display()))?;
        written.push(path);
    }
    info!(charts = written.len(), %from, %to, "dashboard rendered");
    Ok(written)
}
