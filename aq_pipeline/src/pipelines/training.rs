//! Model training, evaluation, registration and hindcast charts.

use std::path::PathBuf;

use air_quality_ingestor::models::weather::WeatherDay;
use anyhow::{Context, bail};
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::{
    charts::{ChartSpec, Series, file_stem, render_svg},
    features::{
        assembly::{FeatureLayout, TrainingRow, split_chronological, training_rows},
        lag::LaggedObservation,
    },
    model::{
        Regressor,
        metrics::{Metrics, mse, r2},
        boosted::BoostedTrees,
        registry::ModelCard,
    },
    pipelines::PipelineContext,
    store::{DateFilter, FeatureStore},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct TrainingOptions {
    /// First date of the test split; today when absent.
    pub test_start: Option<NaiveDate>,
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub card: ModelCard,
    pub charts: Vec<PathBuf>,
}

/// Fit boosted trees on lagged air quality joined to weather, score it on
/// the rows dated `test_start` or later and register it.
pub fn run_training(ctx: &PipelineContext, opt: TrainingOptions) -> anyhow::Result<TrainingOutcome> {
    let groups = ctx.groups()?;
    let lagged: Vec<LaggedObservation> = ctx
        .store
        .read(&groups.lagged, DateFilter::all())
        .context("read lagged features")?;
    let weather: Vec<WeatherDay> = ctx
        .store
        .read(&groups.weather, DateFilter::all())
        .context("read weather")?;

    let layout = FeatureLayout::standard(ctx.lags.clone());
    let rows = training_rows(&lagged, &weather, &layout).context("assemble training rows")?;
    let test_start = opt.test_start.unwrap_or(ctx.today);
    let (train, test) = split_chronological(rows, test_start);
    if train.is_empty() {
        bail!("no complete training rows before {test_start}; run the backfill first");
    }
    if test.is_empty() {
        bail!("no complete rows on or after {test_start} to evaluate on; pick an earlier --test-start");
    }

    let (x, y): (Vec<Vec<f64>>, Vec<f64>) =
        train.iter().map(|r| (r.features.clone(), r.target)).unzip();
    let params = ctx.config.model.boost_params();
    let model = BoostedTrees::fit(layout.width(), &x, &y, &params).context("fit boosted trees")?;

    let test_x: Vec<Vec<f64>> = test.iter().map(|r| r.features.clone()).collect();
    let actual: Vec<f64> = test.iter().map(|r| r.target).collect();
    let predicted = model.predict_many(&test_x).context("score test split")?;
    let metrics = Metrics {
        mse: mse(&actual, &predicted),
        r2: r2(&actual, &predicted),
        test_rows: test.len(),
        train_rows: train.len(),
    };
    info!(train = train.len(), test = test.len(), mse = metrics.mse, r2 = metrics.r2, "model evaluated");

    let card = ModelCard {
        name: ctx.config.model.name.clone(),
        version: 0,
        description: format!(
            "XGBoost regressor ({} rounds, depth {}, eta {}) predicting PM2.5 from daily weather and lags {:?}",
            params.rounds,
            params.max_depth,
            params.eta,
            ctx.lags.as_slice()
        ),
        feature_names: layout.feature_names(),
        lags: ctx.lags.as_slice().to_vec(),
        metrics,
        trained_at: Utc::now(),
    };
    let card = ctx.registry.register(&model, card).context("register model")?;

    let charts = hindcast_charts(ctx, &test, &predicted)?;
    Ok(TrainingOutcome { card, charts })
}

/// One chart per place: test-split predictions against measurements.
fn hindcast_charts(
    ctx: &PipelineContext,
    test: &[TrainingRow],
    predicted: &[f64],
) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (key, place) in &ctx.places {
        let (measured, forecast): (Vec<_>, Vec<_>) = test
            .iter()
            .zip(predicted)
            .filter(|(row, _)| row.entity_id == place.id)
            .map(|(row, p)| ((row.date, row.target), (row.date, *p)))
            .unzip();
        if measured.is_empty() {
            warn!(place = %key, "no test rows, hindcast skipped");
            continue;
        }
        let spec = ChartSpec::new(format!("Hindcast: {}", place.label()))
            .with_series(Series::line("Predicted PM2.5", forecast))
            .with_series(Series::points("Measured PM2.5", measured))
            .with_aqi_bands();
        let path = ctx
            .config
            .project
            .output_dir
            .join(format!("hindcast_{}.svg", file_stem(key)));
        render_svg(&spec, &path).with_context(|| format!("render {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
