//! One-off load of historical air quality and weather.

use std::collections::BTreeMap;

use air_quality_ingestor::{
    io::historical::{list_history_files, read_history_file, sensor_from_path},
    models::{
        observation::Observation,
        place::find_place,
        request_params::{DateRange, WeatherLocation, WeatherRequest},
    },
};
use anyhow::{Context, bail};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::{
    pipelines::{PipelineContext, recompute_lagged},
    store::FeatureStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillSummary {
    pub sensors: usize,
    pub observations: usize,
    pub weather_rows: usize,
    pub lagged_rows: usize,
}

/// Load every sensor export in `history_dir`, fetch archive weather for each
/// sensor's date span, then write air quality, weather and lagged features.
pub async fn run_backfill(ctx: &PipelineContext) -> anyhow::Result<BackfillSummary> {
    let providers = ctx.providers()?;
    let files = list_history_files(&ctx.config.project.history_dir)
        .context("list historical exports")?;
    if files.is_empty() {
        bail!(
            "no *.csv exports in {}",
            ctx.config.project.history_dir.display()
        );
    }

    let mut observations: Vec<Observation> = Vec::new();
    let mut spans: BTreeMap<String, (NaiveDate, NaiveDate)> = BTreeMap::new();
    for file in &files {
        let sensor = sensor_from_path(file)?;
        if find_place(&ctx.places, sensor.as_str()).is_none() {
            bail!(
                "sensor {sensor} from {} has no entry in the places file",
                file.display()
            );
        }
        let rows = read_history_file(file)
            .with_context(|| format!("read history {}", file.display()))?;
        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            debug!(sensor = %sensor, "history export has no usable rows");
            continue;
        };
        spans.insert(sensor.as_str().to_string(), (first.date, last.date));
        observations.extend(rows);
    }
    if spans.is_empty() {
        bail!("historical exports contain no usable rows");
    }

    // Places-file order is the request order.
    let (locations, ranges): (Vec<_>, Vec<_>) = ctx
        .places
        .values()
        .filter_map(|place| {
            spans.get(&place.id).map(|&(start, end)| {
                (
                    WeatherLocation {
                        place_id: place.id.clone(),
                        coords: place.coords(),
                    },
                    DateRange::new(start, end),
                )
            })
        })
        .unzip();
    let request = WeatherRequest::archive(locations, ranges);
    let weather = providers
        .weather
        .daily(&request)
        .await
        .context("fetch historical weather")?;

    let groups = ctx.groups()?;
    ctx.store
        .insert(&groups.air_quality, &observations)
        .context("write air quality")?;
    ctx.store
        .insert(&groups.weather, &weather)
        .context("write weather")?;
    let lagged_rows = recompute_lagged(ctx, &groups)?;

    let summary = BackfillSummary {
        sensors: spans.len(),
        observations: observations.len(),
        weather_rows: weather.len(),
        lagged_rows,
    };
    info!(?summary, "backfill complete");
    Ok(summary)
}
